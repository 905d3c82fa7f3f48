//! Size constraint resolution: undersized segments are merged within their
//! value tier, oversized segments are split by engagement rank. One pass only;
//! anything still out of bounds afterwards is reported, never looped on.

use mece_core::{
    ClassifiedRecord, MergeRecord, NoncompliantSegment, ResolutionFailure, ResolutionLog,
    SegmentLabel, SegmentationConfig, SegmentationResult, SplitHalf, SplitRecord,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::validator::{check_mece, segment_sizes};

/// A population whose segments all lie within the configured bounds.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub records: Vec<ClassifiedRecord>,
    pub log: ResolutionLog,
}

pub struct SizeConstraintResolver {
    min_segment_size: usize,
    max_segment_size: usize,
}

impl SizeConstraintResolver {
    pub fn new(config: &SegmentationConfig) -> Self {
        Self {
            min_segment_size: config.min_segment_size,
            max_segment_size: config.max_segment_size,
        }
    }

    pub fn resolve(&self, mut records: Vec<ClassifiedRecord>) -> SegmentationResult<Resolution> {
        check_mece(&records)?;

        let mut sizes = segment_sizes(&records);
        for (label, size) in &sizes {
            debug!(segment = %label, size, "Segment size before constraints");
        }

        let mut log = ResolutionLog::default();
        let reassign = self.plan_merges(&mut sizes, &mut log);
        if !reassign.is_empty() {
            for classified in &mut records {
                if let Some(target) = classified.segment.and_then(|l| reassign.get(&l)) {
                    classified.segment = Some(*target);
                }
            }
        }

        self.apply_splits(&mut records, &mut log);
        check_mece(&records)?;

        let noncompliant: Vec<NoncompliantSegment> = segment_sizes(&records)
            .into_iter()
            .filter(|(_, size)| !self.within_bounds(*size))
            .map(|(label, size)| NoncompliantSegment {
                label: label.to_string(),
                size,
            })
            .collect();

        info!(
            merges = log.merges.len(),
            splits = log.splits.len(),
            noncompliant = noncompliant.len(),
            "Size constraints applied"
        );

        if noncompliant.is_empty() {
            Ok(Resolution { records, log })
        } else {
            warn!(
                min = self.min_segment_size,
                max = self.max_segment_size,
                "Segments remain out of bounds after one resolution pass"
            );
            Err(ResolutionFailure {
                noncompliant,
                min_segment_size: self.min_segment_size,
                max_segment_size: self.max_segment_size,
                best_effort: records,
                log,
            }
            .into())
        }
    }

    pub fn within_bounds(&self, size: usize) -> bool {
        (self.min_segment_size..=self.max_segment_size).contains(&size)
    }

    /// Decide where each undersized label goes, smallest first. A regular
    /// label without a compliant neighbor falls back to its tier's
    /// catch-all; a catch-all without one stays put. `sizes` is updated as
    /// merges are planned so later choices see earlier growth.
    fn plan_merges(
        &self,
        sizes: &mut BTreeMap<SegmentLabel, usize>,
        log: &mut ResolutionLog,
    ) -> BTreeMap<SegmentLabel, SegmentLabel> {
        let mut undersized: Vec<(SegmentLabel, usize)> = sizes
            .iter()
            .filter(|(_, size)| **size < self.min_segment_size)
            .map(|(label, size)| (*label, *size))
            .collect();
        undersized.sort_by_key(|(label, size)| (*size, *label));

        let mut reassign = BTreeMap::new();
        for (label, _) in undersized {
            let Some(moved) = sizes.get(&label).copied() else {
                continue;
            };
            let target = match self.merge_target(&label, sizes) {
                Some(target) => target,
                None if label.is_catch_all() => continue,
                None => SegmentLabel::new(label.tier().catch_all()),
            };

            sizes.remove(&label);
            *sizes.entry(target).or_insert(0) += moved;
            reassign.insert(label, target);

            info!(from = %label, into = %target, moved, "Merged undersized segment");
            log.merges.push(MergeRecord {
                from: label,
                into: target,
                moved,
            });
        }
        reassign
    }

    /// Nearest compliant same-tier label by rule position, smallest first on
    /// ties. Catch-alls are the fallback, not candidates.
    fn merge_target(
        &self,
        label: &SegmentLabel,
        sizes: &BTreeMap<SegmentLabel, usize>,
    ) -> Option<SegmentLabel> {
        let position = label.name.rule_index();
        sizes
            .iter()
            .filter(|(candidate, size)| {
                *candidate != label
                    && candidate.tier() == label.tier()
                    && !candidate.is_catch_all()
                    && **size >= self.min_segment_size
            })
            .min_by_key(|(candidate, size)| {
                (
                    candidate.name.rule_index().abs_diff(position),
                    **size,
                    **candidate,
                )
            })
            .map(|(candidate, _)| *candidate)
    }

    /// Split every oversized, not-yet-split label into `_A` (higher
    /// engagement) and `_B`. Ties in engagement fall back to user id order.
    fn apply_splits(&self, records: &mut [ClassifiedRecord], log: &mut ResolutionLog) {
        let oversized: Vec<SegmentLabel> = segment_sizes(records)
            .into_iter()
            .filter(|(label, size)| *size > self.max_segment_size && label.half.is_none())
            .map(|(label, _)| label)
            .collect();

        for label in oversized {
            let mut members: Vec<usize> = records
                .iter()
                .enumerate()
                .filter(|(_, r)| r.segment == Some(label))
                .map(|(index, _)| index)
                .collect();
            members.sort_by(|&a, &b| {
                let (ra, rb) = (&records[a].record, &records[b].record);
                rb.engagement_score
                    .total_cmp(&ra.engagement_score)
                    .then_with(|| ra.user_id.cmp(&rb.user_id))
            });

            let a_size = members.len().div_ceil(2);
            for (rank, &index) in members.iter().enumerate() {
                let half = if rank < a_size { SplitHalf::A } else { SplitHalf::B };
                records[index].segment = Some(SegmentLabel::split(label.name, half));
            }

            let b_size = members.len() - a_size;
            info!(segment = %label, a_size, b_size, "Split oversized segment");
            log.splits.push(SplitRecord {
                from: label,
                a_size,
                b_size,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mece_core::{SegmentName, SegmentationError, UserRecord};

    fn member(id: usize, name: SegmentName, engagement: f64) -> ClassifiedRecord {
        ClassifiedRecord {
            record: UserRecord {
                user_id: format!("user_{id:06}"),
                cart_abandoned_at: None,
                last_order_at: None,
                avg_order_value: 100.0,
                sessions_last_30d: 5,
                num_cart_items: 2,
                engagement_score: engagement,
                profitability_score: 0.5,
            },
            recency_score: 0.5,
            segment: Some(SegmentLabel::new(name)),
        }
    }

    fn population(groups: &[(SegmentName, usize)]) -> Vec<ClassifiedRecord> {
        let mut records = Vec::new();
        for (name, count) in groups {
            for _ in 0..*count {
                let id = records.len();
                records.push(member(id, *name, (id % 100) as f64 / 100.0));
            }
        }
        records
    }

    fn resolver(min: usize, max: usize) -> SizeConstraintResolver {
        SizeConstraintResolver::new(&SegmentationConfig {
            min_segment_size: min,
            max_segment_size: max,
            ..Default::default()
        })
    }

    fn size_of(records: &[ClassifiedRecord], label: SegmentLabel) -> usize {
        records.iter().filter(|r| r.segment == Some(label)).count()
    }

    #[test]
    fn test_compliant_population_unchanged() {
        let records = population(&[
            (SegmentName::PremiumEngaged, 30),
            (SegmentName::PremiumOther, 40),
            (SegmentName::LowValueOther, 50),
        ]);
        let resolution = resolver(20, 60).resolve(records.clone()).unwrap();
        assert_eq!(resolution.records, records);
        assert!(resolution.log.is_empty());
    }

    #[test]
    fn test_undersized_merges_into_nearest_neighbor() {
        let records = population(&[
            (SegmentName::MidValueChampions, 5),
            (SegmentName::MidValueEngaged, 30),
            (SegmentName::MidValueActive, 25),
            (SegmentName::MidValueOther, 40),
        ]);
        let resolution = resolver(20, 100).resolve(records).unwrap();
        assert_eq!(resolution.log.merges.len(), 1);
        let merge = &resolution.log.merges[0];
        assert_eq!(merge.from, SegmentLabel::new(SegmentName::MidValueChampions));
        assert_eq!(merge.into, SegmentLabel::new(SegmentName::MidValueEngaged));
        assert_eq!(merge.moved, 5);
        assert_eq!(
            size_of(&resolution.records, SegmentLabel::new(SegmentName::MidValueEngaged)),
            35
        );
    }

    #[test]
    fn test_equidistant_neighbors_prefer_smaller() {
        let records = population(&[
            (SegmentName::MidValueChampions, 40),
            (SegmentName::MidValueEngaged, 3),
            (SegmentName::MidValueActive, 25),
            (SegmentName::MidValueOther, 40),
        ]);
        let resolution = resolver(20, 100).resolve(records).unwrap();
        assert_eq!(
            resolution.log.merges[0].into,
            SegmentLabel::new(SegmentName::MidValueActive)
        );
    }

    #[test]
    fn test_no_neighbor_merges_into_catch_all() {
        let records = population(&[
            (SegmentName::PremiumEngaged, 10),
            (SegmentName::PremiumOther, 600),
        ]);
        let resolution = resolver(500, 20000).resolve(records).unwrap();
        let other = SegmentLabel::new(SegmentName::PremiumOther);
        assert_eq!(size_of(&resolution.records, other), 610);
        assert_eq!(
            size_of(&resolution.records, SegmentLabel::new(SegmentName::PremiumEngaged)),
            0
        );
        assert_eq!(resolution.log.absorbed_by(&other).len(), 1);
    }

    #[test]
    fn test_undersized_catch_all_merges_into_neighbor() {
        let records = population(&[
            (SegmentName::PremiumEngaged, 600),
            (SegmentName::PremiumOther, 10),
        ]);
        let resolution = resolver(500, 20000).resolve(records).unwrap();
        let engaged = SegmentLabel::new(SegmentName::PremiumEngaged);
        let other = SegmentLabel::new(SegmentName::PremiumOther);
        assert_eq!(size_of(&resolution.records, engaged), 610);
        assert_eq!(size_of(&resolution.records, other), 0);
        assert_eq!(resolution.log.absorbed_by(&engaged), vec![other]);
    }

    #[test]
    fn test_tier_collapses_into_only_compliant_label() {
        let records = population(&[
            (SegmentName::MidValueChampions, 2),
            (SegmentName::MidValueEngaged, 3),
            (SegmentName::MidValueActive, 40),
            (SegmentName::MidValueOther, 8),
        ]);
        let resolution = resolver(20, 100).resolve(records).unwrap();
        let active = SegmentLabel::new(SegmentName::MidValueActive);
        assert_eq!(size_of(&resolution.records, active), 53);
        assert_eq!(resolution.log.merges.len(), 3);
        assert!(resolution
            .log
            .merges
            .iter()
            .all(|m| m.into == active));
    }

    #[test]
    fn test_merges_stay_within_tier() {
        let records = population(&[
            (SegmentName::LowValueHighEngagement, 5),
            (SegmentName::PremiumEngaged, 50),
            (SegmentName::LowValueOther, 50),
        ]);
        let resolution = resolver(20, 100).resolve(records).unwrap();
        assert_eq!(
            resolution.log.merges[0].into,
            SegmentLabel::new(SegmentName::LowValueOther)
        );
    }

    #[test]
    fn test_oversized_splits_by_engagement() {
        let records = population(&[(SegmentName::LowValueOther, 11)]);
        let resolution = resolver(1, 10).resolve(records).unwrap();
        let a = SegmentLabel::split(SegmentName::LowValueOther, SplitHalf::A);
        let b = SegmentLabel::split(SegmentName::LowValueOther, SplitHalf::B);
        assert_eq!(size_of(&resolution.records, a), 6);
        assert_eq!(size_of(&resolution.records, b), 5);

        let min_a = resolution
            .records
            .iter()
            .filter(|r| r.segment == Some(a))
            .map(|r| r.record.engagement_score)
            .fold(f64::INFINITY, f64::min);
        let max_b = resolution
            .records
            .iter()
            .filter(|r| r.segment == Some(b))
            .map(|r| r.record.engagement_score)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(min_a >= max_b);
    }

    #[test]
    fn test_engagement_ties_split_by_user_id() {
        let mut records = population(&[(SegmentName::PremiumOther, 4)]);
        for r in &mut records {
            r.record.engagement_score = 0.5;
        }
        let resolution = resolver(1, 3).resolve(records).unwrap();
        let a = SegmentLabel::split(SegmentName::PremiumOther, SplitHalf::A);
        let a_ids: Vec<&str> = resolution
            .records
            .iter()
            .filter(|r| r.segment == Some(a))
            .map(|r| r.record.user_id.as_str())
            .collect();
        assert_eq!(a_ids, vec!["user_000000", "user_000001"]);
    }

    #[test]
    fn test_out_of_bounds_after_one_pass_is_failure() {
        // The catch-all stays undersized and the halves of a 50-member split
        // still exceed the maximum.
        let records = population(&[
            (SegmentName::PremiumOther, 3),
            (SegmentName::LowValueOther, 50),
        ]);
        let err = resolver(5, 20).resolve(records).unwrap_err();
        let SegmentationError::ResolutionFailure(failure) = err else {
            panic!("expected resolution failure");
        };
        let labels: Vec<&str> = failure.noncompliant.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Premium_Other", "Low_Value_Other_A", "Low_Value_Other_B"]
        );
        assert_eq!(failure.best_effort.len(), 53);
        assert_eq!(failure.log.splits.len(), 1);
    }

    #[test]
    fn test_unlabeled_input_is_mece_violation() {
        let mut records = population(&[(SegmentName::PremiumOther, 3)]);
        records[1].segment = None;
        assert!(matches!(
            resolver(1, 10).resolve(records),
            Err(SegmentationError::MeceViolation(_))
        ));
    }

    #[test]
    fn test_resolving_twice_is_noop() {
        let records = population(&[
            (SegmentName::MidValueChampions, 4),
            (SegmentName::MidValueEngaged, 30),
            (SegmentName::MidValueOther, 70),
        ]);
        let r = resolver(10, 50);
        let first = r.resolve(records).unwrap();
        let second = r.resolve(first.records.clone()).unwrap();
        assert_eq!(first.records, second.records);
        assert!(second.log.is_empty());
    }
}
