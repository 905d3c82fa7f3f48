use crate::types::{ClassifiedRecord, ResolutionLog};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type SegmentationResult<T> = Result<T, SegmentationError>;

#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("Configuration error: {}", .0.join("; "))]
    Configuration(Vec<String>),

    #[error("Schema error in column '{column}': {reason}")]
    Schema { column: String, reason: String },

    #[error("MECE violation: {0}")]
    MeceViolation(MeceReport),

    #[error("Resolution failure: {0}")]
    ResolutionFailure(Box<ResolutionFailure>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SegmentationError {
    pub fn schema(column: impl Into<String>, reason: impl Into<String>) -> Self {
        SegmentationError::Schema {
            column: column.into(),
            reason: reason.into(),
        }
    }
}

impl From<MeceReport> for SegmentationError {
    fn from(report: MeceReport) -> Self {
        SegmentationError::MeceViolation(report)
    }
}

impl From<ResolutionFailure> for SegmentationError {
    fn from(failure: ResolutionFailure) -> Self {
        SegmentationError::ResolutionFailure(Box::new(failure))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Record carries no segment label.
    Unlabeled,
    /// The same user identifier appears more than once.
    DuplicateUniverseMembership,
    /// A universe member is absent from the labeled population, or a labeled
    /// record does not belong to the universe.
    MissingFromUniverse,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationKind::Unlabeled => "unlabeled",
            ViolationKind::DuplicateUniverseMembership => "duplicate-universe-membership",
            ViolationKind::MissingFromUniverse => "missing-from-universe",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeceViolation {
    pub user_id: String,
    pub kind: ViolationKind,
}

/// Outcome of a failed MECE check: every offending record and why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MeceReport {
    pub violations: Vec<MeceViolation>,
}

impl MeceReport {
    pub fn push(&mut self, user_id: impl Into<String>, kind: ViolationKind) {
        self.violations.push(MeceViolation {
            user_id: user_id.into(),
            kind,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &MeceViolation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }
}

impl fmt::Display for MeceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} offending record(s)", self.violations.len())?;
        for kind in [
            ViolationKind::Unlabeled,
            ViolationKind::DuplicateUniverseMembership,
            ViolationKind::MissingFromUniverse,
        ] {
            let ids: Vec<&str> = self.of_kind(kind).map(|v| v.user_id.as_str()).collect();
            if !ids.is_empty() {
                write!(f, "; {kind}: [{}]", ids.join(", "))?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoncompliantSegment {
    pub label: String,
    pub size: usize,
}

/// Raised when one resolver pass leaves segments outside the size bounds.
/// Carries the best-effort population so the caller may still accept it.
#[derive(Debug, Clone)]
pub struct ResolutionFailure {
    pub noncompliant: Vec<NoncompliantSegment>,
    pub min_segment_size: usize,
    pub max_segment_size: usize,
    pub best_effort: Vec<ClassifiedRecord>,
    pub log: ResolutionLog,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segments: Vec<String> = self
            .noncompliant
            .iter()
            .map(|s| format!("{}={}", s.label, s.size))
            .collect();
        write!(
            f,
            "segments outside [{}, {}] after one pass: {}",
            self.min_segment_size,
            self.max_segment_size,
            segments.join(", ")
        )
    }
}
