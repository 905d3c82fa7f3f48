//! Universe definition: users who abandoned a cart within the recency window.

use chrono::{DateTime, Duration, Utc};
use mece_core::{SegmentationError, SegmentationConfig, SegmentationResult, UserRecord};
use tracing::info;

pub struct UniverseFilter {
    window: Duration,
}

impl UniverseFilter {
    pub fn new(config: &SegmentationConfig) -> Self {
        Self {
            window: config.recency_window(),
        }
    }

    /// Keep records whose abandonment falls within `[now - window, now]`.
    /// Records without an abandonment timestamp are dropped. Field domains
    /// are checked first so a malformed table fails before filtering.
    pub fn apply(&self, records: &[UserRecord], now: DateTime<Utc>) -> SegmentationResult<Vec<UserRecord>> {
        for record in records {
            check_domain(record)?;
        }

        let cutoff = now
            .checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let universe: Vec<UserRecord> = records
            .iter()
            .filter(|r| {
                r.cart_abandoned_at
                    .is_some_and(|at| at >= cutoff && at <= now)
            })
            .cloned()
            .collect();

        info!(
            population = records.len(),
            universe = universe.len(),
            window_days = self.window.num_days(),
            "Universe defined"
        );
        Ok(universe)
    }
}

fn check_domain(record: &UserRecord) -> SegmentationResult<()> {
    if record.user_id.is_empty() {
        return Err(SegmentationError::schema("user_id", "empty identifier"));
    }
    if !(record.avg_order_value.is_finite() && record.avg_order_value >= 0.0) {
        return Err(SegmentationError::schema(
            "avg_order_value",
            format!(
                "user {}: must be a non-negative number (got {})",
                record.user_id, record.avg_order_value
            ),
        ));
    }
    for (column, value) in [
        ("engagement_score", record.engagement_score),
        ("profitability_score", record.profitability_score),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(SegmentationError::schema(
                column,
                format!("user {}: must be within [0, 1] (got {value})", record.user_id),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn abandoned(id: &str, at: Option<DateTime<Utc>>) -> UserRecord {
        UserRecord {
            user_id: id.to_string(),
            cart_abandoned_at: at,
            last_order_at: None,
            avg_order_value: 80.0,
            sessions_last_30d: 4,
            num_cart_items: 1,
            engagement_score: 0.5,
            profitability_score: 0.5,
        }
    }

    #[test]
    fn test_window_is_inclusive() {
        let filter = UniverseFilter::new(&SegmentationConfig::default());
        let records = vec![
            abandoned("edge", Some(now() - Duration::days(7))),
            abandoned("just_now", Some(now())),
            abandoned("too_old", Some(now() - Duration::days(7) - Duration::seconds(1))),
            abandoned("future", Some(now() + Duration::seconds(1))),
            abandoned("never", None),
        ];

        let universe = filter.apply(&records, now()).unwrap();
        let ids: Vec<&str> = universe.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, vec!["edge", "just_now"]);
    }

    #[test]
    fn test_custom_window() {
        let config = SegmentationConfig {
            recency_window_days: 2,
            ..Default::default()
        };
        let filter = UniverseFilter::new(&config);
        let records = vec![
            abandoned("a", Some(now() - Duration::days(1))),
            abandoned("b", Some(now() - Duration::days(3))),
        ];
        assert_eq!(filter.apply(&records, now()).unwrap().len(), 1);
    }

    #[test]
    fn test_unvalidated_huge_window_does_not_overflow() {
        let config = SegmentationConfig {
            recency_window_days: 200_000_000,
            ..Default::default()
        };
        let filter = UniverseFilter::new(&config);
        let records = vec![
            abandoned("old", Some(now() - Duration::days(365 * 50))),
            abandoned("future", Some(now() + Duration::days(1))),
        ];
        let universe = filter.apply(&records, now()).unwrap();
        assert_eq!(universe.len(), 1);
        assert_eq!(universe[0].user_id, "old");
    }

    #[test]
    fn test_out_of_range_score_is_schema_error() {
        let filter = UniverseFilter::new(&SegmentationConfig::default());
        let mut record = abandoned("bad", Some(now()));
        record.engagement_score = 1.5;
        match filter.apply(&[record], now()) {
            Err(SegmentationError::Schema { column, reason }) => {
                assert_eq!(column, "engagement_score");
                assert!(reason.contains("bad"));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_aov_is_schema_error() {
        let filter = UniverseFilter::new(&SegmentationConfig::default());
        let mut record = abandoned("neg", Some(now()));
        record.avg_order_value = -1.0;
        assert!(filter.apply(&[record], now()).is_err());
    }

    #[test]
    fn test_empty_population() {
        let filter = UniverseFilter::new(&SegmentationConfig::default());
        assert!(filter.apply(&[], now()).unwrap().is_empty());
    }
}
