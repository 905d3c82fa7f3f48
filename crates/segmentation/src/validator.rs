//! MECE checks over a labeled population.

use mece_core::{ClassifiedRecord, MeceReport, SegmentLabel, ViolationKind};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// `Ok` when the population is a partition; otherwise the offending records.
pub type ValidationResult = Result<(), MeceReport>;

/// Exclusivity and labeling: every record carries a label from the closed
/// taxonomy and no user identifier occurs twice.
pub fn check_mece(records: &[ClassifiedRecord]) -> ValidationResult {
    let mut report = MeceReport::default();
    let mut seen = HashSet::with_capacity(records.len());

    for classified in records {
        let user_id = classified.record.user_id.as_str();
        if classified.segment.is_none() {
            report.push(user_id, ViolationKind::Unlabeled);
        }
        if !seen.insert(user_id) {
            report.push(user_id, ViolationKind::DuplicateUniverseMembership);
        }
    }

    finish(report, records.len())
}

/// `check_mece` plus exhaustiveness: the labeled records are exactly the
/// universe, no member lost and none added.
pub fn check_mece_against<'a, I>(universe: I, records: &[ClassifiedRecord]) -> ValidationResult
where
    I: IntoIterator<Item = &'a str>,
{
    let mut report = match check_mece(records) {
        Ok(()) => MeceReport::default(),
        Err(report) => report,
    };

    let universe: HashSet<&str> = universe.into_iter().collect();
    let labeled: HashSet<&str> = records.iter().map(|r| r.record.user_id.as_str()).collect();

    let mut missing: Vec<&str> = universe.difference(&labeled).copied().collect();
    missing.extend(labeled.difference(&universe).copied());
    missing.sort_unstable();
    for user_id in missing {
        report.push(user_id, ViolationKind::MissingFromUniverse);
    }

    finish(report, records.len())
}

/// Per-label member counts, in taxonomy order. Unlabeled records are not
/// counted.
pub fn segment_sizes(records: &[ClassifiedRecord]) -> BTreeMap<SegmentLabel, usize> {
    let mut sizes = BTreeMap::new();
    for label in records.iter().filter_map(|r| r.segment) {
        *sizes.entry(label).or_insert(0) += 1;
    }
    sizes
}

fn finish(report: MeceReport, population: usize) -> ValidationResult {
    if report.is_empty() {
        debug!(population, "MECE validation passed");
        Ok(())
    } else {
        warn!(
            population,
            violations = report.violations.len(),
            "MECE validation failed"
        );
        Err(report)
    }
}
