//! MECE segmentation engine for cart abandoners: universe definition,
//! recency scoring, decision-tree classification, MECE validation, size
//! constraint resolution and segment scoring.

pub mod classifier;
pub mod engine;
pub mod predicates;
pub mod recency;
pub mod resolver;
pub mod scorer;
pub mod table;
pub mod universe;
pub mod validator;

pub use classifier::{Classification, SegmentClassifier};
pub use engine::{classify_and_score, run_analysis, AnalysisReport, SegmentationEngine};
pub use recency::ScoreDeriver;
pub use resolver::{Resolution, SizeConstraintResolver};
pub use scorer::SegmentScorer;
pub use universe::UniverseFilter;
pub use validator::{check_mece, check_mece_against, ValidationResult};
