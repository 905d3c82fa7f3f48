//! Weighted multi-factor scoring and ranking of final segments.

use mece_core::{
    ClassifiedRecord, ResolutionLog, SegmentLabel, SegmentSummary, SegmentationConfig, SplitHalf,
    TierThresholds, ValueTier,
};
use std::collections::BTreeMap;
use tracing::info;

use crate::predicates;

pub struct SegmentScorer<'a> {
    config: &'a SegmentationConfig,
}

impl<'a> SegmentScorer<'a> {
    pub fn new(config: &'a SegmentationConfig) -> Self {
        Self { config }
    }

    /// One summary per label present, sorted by overall score descending,
    /// then size descending. Read-only over `records`.
    pub fn score(
        &self,
        records: &[ClassifiedRecord],
        log: &ResolutionLog,
        thresholds: &TierThresholds,
    ) -> Vec<SegmentSummary> {
        let mut groups: BTreeMap<SegmentLabel, Vec<&ClassifiedRecord>> = BTreeMap::new();
        for classified in records {
            if let Some(label) = classified.segment {
                groups.entry(label).or_default().push(classified);
            }
        }
        if groups.is_empty() {
            return Vec::new();
        }

        let baseline = mean(records.iter().map(conversion_signal));
        let largest = groups.values().map(Vec::len).max().unwrap_or(1);
        let weights = &self.config.weights;

        let mut summaries: Vec<SegmentSummary> = groups
            .into_iter()
            .map(|(label, members)| {
                let size = members.len();
                let conversion_potential = mean(members.iter().copied().map(conversion_signal));
                let lift_vs_control = self.lift(&label, conversion_potential, baseline);
                let size_score = size as f64 / largest as f64;
                let profitability = mean(members.iter().map(|m| m.record.profitability_score));
                let strategic_fit = self.config.strategic_fit.for_tier(label.tier());

                let overall_score = weights.conversion_potential * conversion_potential
                    + weights.lift_vs_control * lift_vs_control
                    + weights.size_score * size_score
                    + weights.profitability * profitability
                    + weights.strategic_fit * strategic_fit;

                SegmentSummary {
                    segment_name: label.to_string(),
                    tier: label.tier(),
                    rules_applied: self.describe(&label, log, thresholds),
                    size,
                    conversion_potential,
                    lift_vs_control,
                    size_score,
                    profitability,
                    strategic_fit,
                    overall_score,
                    valid: (self.config.min_segment_size..=self.config.max_segment_size)
                        .contains(&size),
                    avg_aov: mean(members.iter().map(|m| m.record.avg_order_value)),
                    avg_engagement: mean(members.iter().map(|m| m.record.engagement_score)),
                    avg_sessions: mean(
                        members
                            .iter()
                            .map(|m| f64::from(m.record.sessions_last_30d)),
                    ),
                    merged_from: log
                        .absorbed_by(&label)
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                }
            })
            .collect();

        summaries.sort_by(|a, b| {
            b.overall_score
                .total_cmp(&a.overall_score)
                .then_with(|| b.size.cmp(&a.size))
                .then_with(|| a.segment_name.cmp(&b.segment_name))
        });

        if let Some(top) = summaries.first() {
            info!(
                segments = summaries.len(),
                top_segment = %top.segment_name,
                top_score = top.overall_score,
                "Segments scored"
            );
        }
        summaries
    }

    /// Configured estimate if present, otherwise the segment's conversion
    /// potential relative to the population baseline, mapped so that the
    /// baseline scores 0.5 and twice the baseline or more scores 1.0.
    fn lift(&self, label: &SegmentLabel, conversion_potential: f64, baseline: f64) -> f64 {
        if let Some(fixed) = self.config.lift_overrides.get(&label.to_string()) {
            return *fixed;
        }
        if baseline <= 0.0 {
            return 0.0;
        }
        (conversion_potential / (2.0 * baseline)).clamp(0.0, 1.0)
    }

    fn describe(&self, label: &SegmentLabel, log: &ResolutionLog, thresholds: &TierThresholds) -> String {
        let mut rule = format!(
            "{} & {}",
            self.describe_tier(label.tier(), thresholds),
            predicates::rule_for(label.name).describe(self.config)
        );
        if let Some(half) = label.half {
            let which = match half {
                SplitHalf::A => "Top",
                SplitHalf::B => "Bottom",
            };
            rule.push_str(&format!(" & {which} engagement half"));
        }
        let absorbed = log.absorbed_by(label);
        if !absorbed.is_empty() {
            let names: Vec<String> = absorbed.iter().map(ToString::to_string).collect();
            rule.push_str(&format!(" (+ merged: {})", names.join(", ")));
        }
        rule
    }

    fn describe_tier(&self, tier: ValueTier, thresholds: &TierThresholds) -> String {
        let high = self.config.aov_high_percentile;
        let medium = self.config.aov_medium_percentile;
        match tier {
            ValueTier::High => format!("AOV > {high}th percentile ({:.2})", thresholds.high),
            ValueTier::Medium => format!(
                "AOV > {medium}th percentile ({:.2}) & AOV <= {high}th percentile ({:.2})",
                thresholds.medium, thresholds.high
            ),
            ValueTier::Low => format!("AOV <= {medium}th percentile ({:.2})", thresholds.medium),
        }
    }
}

fn conversion_signal(classified: &ClassifiedRecord) -> f64 {
    classified.record.engagement_score * classified.recency_score
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
