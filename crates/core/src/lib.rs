//! Shared types, configuration and error taxonomy for MECE audience
//! segmentation.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, ResolutionPolicy, ScoringWeights, SegmentationConfig, TierWeights};
pub use error::{
    MeceReport, MeceViolation, NoncompliantSegment, ResolutionFailure, SegmentationError,
    SegmentationResult, ViolationKind,
};
pub use types::{
    ClassifiedRecord, MergeRecord, ResolutionLog, SegmentLabel, SegmentName, SegmentSummary,
    SplitHalf, SplitRecord, TierThresholds, UserRecord, ValueTier,
};
