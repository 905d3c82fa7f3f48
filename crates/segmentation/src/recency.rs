//! Recency score derived from the cart-abandonment timestamp.

use chrono::{DateTime, Utc};
use mece_core::{ClassifiedRecord, SegmentationConfig, UserRecord};

pub struct ScoreDeriver {
    now: DateTime<Utc>,
    window_secs: f64,
    floor: f64,
}

impl ScoreDeriver {
    pub fn new(config: &SegmentationConfig, now: DateTime<Utc>) -> Self {
        Self {
            now,
            window_secs: config.recency_window().num_seconds() as f64,
            floor: config.recency_floor,
        }
    }

    /// 1.0 at `now`, decaying linearly to the configured floor at the window
    /// edge and clamped there beyond it. Missing timestamps score the floor.
    pub fn recency_score(&self, abandoned_at: Option<DateTime<Utc>>) -> f64 {
        let Some(at) = abandoned_at else {
            return self.floor;
        };
        if self.window_secs <= 0.0 {
            return self.floor;
        }
        let elapsed = (self.now - at).num_milliseconds() as f64 / 1000.0;
        let fraction = (elapsed / self.window_secs).clamp(0.0, 1.0);
        (1.0 - (1.0 - self.floor) * fraction).max(self.floor)
    }

    /// Attach recency scores to universe members. Labels are left unset.
    pub fn derive(&self, universe: Vec<UserRecord>) -> Vec<ClassifiedRecord> {
        universe
            .into_iter()
            .map(|record| ClassifiedRecord {
                recency_score: self.recency_score(record.cart_abandoned_at),
                record,
                segment: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_linear_decay_to_zero() {
        let deriver = ScoreDeriver::new(&SegmentationConfig::default(), now());
        assert_eq!(deriver.recency_score(Some(now())), 1.0);
        assert_eq!(deriver.recency_score(Some(now() - Duration::days(7))), 0.0);
        let mid = deriver.recency_score(Some(now() - Duration::hours(84)));
        assert!((mid - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_floor_applies_at_edge() {
        let config = SegmentationConfig {
            recency_floor: 0.2,
            ..Default::default()
        };
        let deriver = ScoreDeriver::new(&config, now());
        assert!((deriver.recency_score(Some(now() - Duration::days(7))) - 0.2).abs() < 1e-12);
        assert!((deriver.recency_score(Some(now() - Duration::days(30))) - 0.2).abs() < 1e-12);
        assert_eq!(deriver.recency_score(None), 0.2);
    }

    #[test]
    fn test_more_recent_scores_higher() {
        let deriver = ScoreDeriver::new(&SegmentationConfig::default(), now());
        let recent = deriver.recency_score(Some(now() - Duration::days(1)));
        let old = deriver.recency_score(Some(now() - Duration::days(6)));
        assert!(recent > old);
    }

    #[test]
    fn test_derive_leaves_segment_unset() {
        let deriver = ScoreDeriver::new(&SegmentationConfig::default(), now());
        let record = UserRecord {
            user_id: "user_000010".to_string(),
            cart_abandoned_at: Some(now()),
            last_order_at: None,
            avg_order_value: 55.0,
            sessions_last_30d: 3,
            num_cart_items: 2,
            engagement_score: 0.3,
            profitability_score: 0.4,
        };
        let derived = deriver.derive(vec![record]);
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].recency_score, 1.0);
        assert!(derived[0].segment.is_none());
    }
}
