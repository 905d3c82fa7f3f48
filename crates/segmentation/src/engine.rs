//! Pipeline driver: universe → recency → classification → MECE check →
//! size constraints → MECE re-check → scoring.

use chrono::{DateTime, Utc};
use mece_core::{
    ClassifiedRecord, NoncompliantSegment, ResolutionLog, ResolutionPolicy, SegmentSummary,
    SegmentationConfig, SegmentationError, SegmentationResult, TierThresholds, UserRecord,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::classifier::SegmentClassifier;
use crate::recency::ScoreDeriver;
use crate::resolver::SizeConstraintResolver;
use crate::scorer::SegmentScorer;
use crate::universe::UniverseFilter;
use crate::validator::check_mece_against;

/// Everything one analysis run produced.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub population: usize,
    pub universe: usize,
    /// `None` when the universe is empty.
    pub thresholds: Option<TierThresholds>,
    #[serde(skip)]
    pub records: Vec<ClassifiedRecord>,
    pub resolution: ResolutionLog,
    /// Segments left out of bounds when a best-effort result was accepted.
    pub noncompliant: Vec<NoncompliantSegment>,
    pub summaries: Vec<SegmentSummary>,
}

/// Validated configuration bound to the pipeline. Holds no state between
/// runs.
pub struct SegmentationEngine {
    config: SegmentationConfig,
}

impl SegmentationEngine {
    pub fn new(config: SegmentationConfig) -> SegmentationResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    pub fn run(&self, records: &[UserRecord], now: DateTime<Utc>) -> SegmentationResult<AnalysisReport> {
        let config = &self.config;
        let universe = UniverseFilter::new(config).apply(records, now)?;

        if universe.is_empty() {
            info!(population = records.len(), "Empty universe, nothing to segment");
            return Ok(AnalysisReport {
                population: records.len(),
                universe: 0,
                thresholds: None,
                records: Vec::new(),
                resolution: ResolutionLog::default(),
                noncompliant: Vec::new(),
                summaries: Vec::new(),
            });
        }

        let universe_ids: Vec<String> = universe.iter().map(|r| r.user_id.clone()).collect();
        let derived = ScoreDeriver::new(config, now).derive(universe);
        let classification = SegmentClassifier::new(config).classify(derived);
        check_mece_against(universe_ids.iter().map(String::as_str), &classification.records)?;

        let (final_records, resolution, noncompliant) =
            match SizeConstraintResolver::new(config).resolve(classification.records) {
                Ok(resolution) => (resolution.records, resolution.log, Vec::new()),
                Err(SegmentationError::ResolutionFailure(failure))
                    if config.resolution == ResolutionPolicy::BestEffort =>
                {
                    warn!(%failure, "Accepting best-effort segmentation");
                    let failure = *failure;
                    (failure.best_effort, failure.log, failure.noncompliant)
                }
                Err(err) => return Err(err),
            };
        check_mece_against(universe_ids.iter().map(String::as_str), &final_records)?;

        let summaries = SegmentScorer::new(config).score(
            &final_records,
            &resolution,
            &classification.thresholds,
        );

        Ok(AnalysisReport {
            population: records.len(),
            universe: universe_ids.len(),
            thresholds: Some(classification.thresholds),
            records: final_records,
            resolution,
            noncompliant,
            summaries,
        })
    }
}

/// Full pipeline run with a freshly validated configuration.
pub fn run_analysis(
    records: &[UserRecord],
    config: &SegmentationConfig,
    now: DateTime<Utc>,
) -> SegmentationResult<AnalysisReport> {
    SegmentationEngine::new(config.clone())?.run(records, now)
}

/// Ranked segment summaries for `records`. An empty universe yields an
/// empty list.
pub fn classify_and_score(
    records: &[UserRecord],
    config: &SegmentationConfig,
    now: DateTime<Utc>,
) -> SegmentationResult<Vec<SegmentSummary>> {
    Ok(run_analysis(records, config, now)?.summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
    }

    fn user(id: usize, aov: f64, engagement: f64, days_ago: i64) -> UserRecord {
        UserRecord {
            user_id: format!("user_{id:06}"),
            cart_abandoned_at: Some(now() - Duration::days(days_ago)),
            last_order_at: None,
            avg_order_value: aov,
            sessions_last_30d: (id % 20) as u32,
            num_cart_items: 1 + (id % 4) as u32,
            engagement_score: engagement,
            profitability_score: ((id * 7) % 10) as f64 / 10.0,
        }
    }

    #[test]
    fn test_invalid_config_rejected_before_processing() {
        let config = SegmentationConfig {
            min_segment_size: 10,
            max_segment_size: 5,
            ..Default::default()
        };
        assert!(matches!(
            SegmentationEngine::new(config),
            Err(SegmentationError::Configuration(_))
        ));
    }

    #[test]
    fn test_oversized_window_is_configuration_error() {
        let config = SegmentationConfig {
            recency_window_days: 200_000_000,
            ..Default::default()
        };
        let records = vec![user(1, 50.0, 0.5, 1)];
        assert!(matches!(
            classify_and_score(&records, &config, now()),
            Err(SegmentationError::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_input_is_empty_summary() {
        let summaries = classify_and_score(&[], &SegmentationConfig::default(), now()).unwrap();
        assert!(summaries.is_empty());
    }

    #[test]
    fn test_stale_population_is_empty_summary() {
        let records = vec![user(1, 50.0, 0.5, 30), user(2, 80.0, 0.5, 9)];
        let report = run_analysis(&records, &SegmentationConfig::default(), now()).unwrap();
        assert_eq!(report.population, 2);
        assert_eq!(report.universe, 0);
        assert!(report.thresholds.is_none());
        assert!(report.summaries.is_empty());
    }

    #[test]
    fn test_summary_sizes_cover_universe() {
        let records: Vec<UserRecord> = (0..200)
            .map(|i| user(i, 10.0 + (i * 17 % 200) as f64, (i * 31 % 100) as f64 / 100.0, (i % 10) as i64))
            .collect();
        let config = SegmentationConfig {
            min_segment_size: 1,
            max_segment_size: 200,
            ..Default::default()
        };
        let report = run_analysis(&records, &config, now()).unwrap();
        let total: usize = report.summaries.iter().map(|s| s.size).sum();
        assert_eq!(total, report.universe);
        assert_eq!(report.records.len(), report.universe);
        assert!(report.universe < report.population);
    }

    #[test]
    fn test_strict_policy_surfaces_failure() {
        let records: Vec<UserRecord> = (0..20).map(|i| user(i, 10.0 * i as f64, 0.5, 1)).collect();
        let config = SegmentationConfig {
            min_segment_size: 50,
            max_segment_size: 100,
            ..Default::default()
        };
        assert!(matches!(
            classify_and_score(&records, &config, now()),
            Err(SegmentationError::ResolutionFailure(_))
        ));
    }

    #[test]
    fn test_best_effort_policy_flags_invalid_segments() {
        let records: Vec<UserRecord> = (0..20).map(|i| user(i, 10.0 * i as f64, 0.5, 1)).collect();
        let config = SegmentationConfig {
            min_segment_size: 50,
            max_segment_size: 100,
            resolution: ResolutionPolicy::BestEffort,
            ..Default::default()
        };
        let report = run_analysis(&records, &config, now()).unwrap();
        assert!(!report.noncompliant.is_empty());
        assert!(report.summaries.iter().all(|s| !s.valid));
        assert_eq!(report.summaries.iter().map(|s| s.size).sum::<usize>(), 20);
    }
}
