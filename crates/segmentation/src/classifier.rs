//! Decision-tree classifier: value tier from AOV percentiles, then the tier's
//! rule table.

use mece_core::{ClassifiedRecord, SegmentLabel, SegmentationConfig, TierThresholds};
use tracing::info;

use crate::predicates;

/// Classifier output: labeled records and the AOV cut points that produced
/// them.
#[derive(Debug, Clone)]
pub struct Classification {
    pub records: Vec<ClassifiedRecord>,
    pub thresholds: TierThresholds,
}

pub struct SegmentClassifier<'a> {
    config: &'a SegmentationConfig,
}

impl<'a> SegmentClassifier<'a> {
    pub fn new(config: &'a SegmentationConfig) -> Self {
        Self { config }
    }

    /// AOV cut points for the given population.
    pub fn thresholds(&self, records: &[ClassifiedRecord]) -> TierThresholds {
        let mut values: Vec<f64> = records.iter().map(|r| r.record.avg_order_value).collect();
        values.sort_by(f64::total_cmp);
        TierThresholds {
            high: percentile(&values, self.config.aov_high_percentile),
            medium: percentile(&values, self.config.aov_medium_percentile),
        }
    }

    /// Label every record. Each record's label depends only on its own fields
    /// and the population thresholds.
    pub fn classify(&self, mut records: Vec<ClassifiedRecord>) -> Classification {
        let thresholds = self.thresholds(&records);
        info!(
            aov_high = thresholds.high,
            aov_medium = thresholds.medium,
            engagement_high = self.config.engagement_high_threshold,
            engagement_medium = self.config.engagement_medium_threshold,
            profitability_high = self.config.profitability_high_threshold,
            "Segmentation thresholds"
        );

        for classified in &mut records {
            classified.segment = Some(self.label_for(classified, &thresholds));
        }

        Classification {
            records,
            thresholds,
        }
    }

    pub fn label_for(&self, classified: &ClassifiedRecord, thresholds: &TierThresholds) -> SegmentLabel {
        let tier = thresholds.tier_for(classified.record.avg_order_value);
        SegmentLabel::new(predicates::first_match(tier, &classified.record, self.config))
    }
}

/// Percentile of sorted values with linear interpolation between the closest
/// ranks. Empty input yields 0.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (pct / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}
