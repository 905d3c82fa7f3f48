use crate::error::{SegmentationError, SegmentationResult};
use crate::types::ValueTier;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Tolerance used when checking that scoring weights sum to 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Longest accepted recency window, in days.
pub const MAX_RECENCY_WINDOW_DAYS: i64 = 36_500;

/// Root application configuration. Loaded from environment variables
/// with the prefix `MECE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Thresholds, bounds and weights consumed by every pipeline stage. Passed
/// explicitly into each call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SegmentationConfig {
    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: i64,
    /// Recency score assigned at the edge of the window.
    #[serde(default)]
    pub recency_floor: f64,
    #[serde(default = "default_min_segment_size")]
    pub min_segment_size: usize,
    #[serde(default = "default_max_segment_size")]
    pub max_segment_size: usize,
    #[serde(default = "default_aov_high_percentile")]
    pub aov_high_percentile: f64,
    #[serde(default = "default_aov_medium_percentile")]
    pub aov_medium_percentile: f64,
    #[serde(default = "default_engagement_high_threshold")]
    pub engagement_high_threshold: f64,
    #[serde(default = "default_engagement_medium_threshold")]
    pub engagement_medium_threshold: f64,
    #[serde(default = "default_profitability_high_threshold")]
    pub profitability_high_threshold: f64,
    /// Minimum 30-day sessions for `Mid_Value_Active`.
    #[serde(default = "default_mid_activity_sessions")]
    pub mid_activity_sessions: u32,
    #[serde(default)]
    pub weights: ScoringWeights,
    #[serde(default)]
    pub strategic_fit: TierWeights,
    /// Fixed lift-vs-control estimates keyed by segment label. Labels not
    /// listed get the derived estimate.
    #[serde(default)]
    pub lift_overrides: BTreeMap<String, f64>,
    #[serde(default)]
    pub resolution: ResolutionPolicy,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_weight_conversion")]
    pub conversion_potential: f64,
    #[serde(default = "default_weight_lift")]
    pub lift_vs_control: f64,
    #[serde(default = "default_weight_minor")]
    pub size_score: f64,
    #[serde(default = "default_weight_minor")]
    pub profitability: f64,
    #[serde(default = "default_weight_minor")]
    pub strategic_fit: f64,
}

/// Static business weight per value tier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TierWeights {
    #[serde(default = "default_fit_high")]
    pub high: f64,
    #[serde(default = "default_fit_medium")]
    pub medium: f64,
    #[serde(default = "default_fit_low")]
    pub low: f64,
}

/// What to do when one resolver pass cannot bring every segment in bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// Surface the failure to the caller.
    #[default]
    Strict,
    /// Score the best-effort population, flagging noncompliant segments.
    BestEffort,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default = "default_output_prefix")]
    pub prefix: String,
}

// Default functions
fn default_recency_window_days() -> i64 {
    7
}
fn default_min_segment_size() -> usize {
    500
}
fn default_max_segment_size() -> usize {
    20000
}
fn default_aov_high_percentile() -> f64 {
    80.0
}
fn default_aov_medium_percentile() -> f64 {
    50.0
}
fn default_engagement_high_threshold() -> f64 {
    0.7
}
fn default_engagement_medium_threshold() -> f64 {
    0.4
}
fn default_profitability_high_threshold() -> f64 {
    0.7
}
fn default_mid_activity_sessions() -> u32 {
    11
}
fn default_weight_conversion() -> f64 {
    0.3
}
fn default_weight_lift() -> f64 {
    0.25
}
fn default_weight_minor() -> f64 {
    0.15
}
fn default_fit_high() -> f64 {
    0.9
}
fn default_fit_medium() -> f64 {
    0.6
}
fn default_fit_low() -> f64 {
    0.3
}
fn default_output_dir() -> String {
    "outputs".to_string()
}
fn default_output_prefix() -> String {
    "mece_segments".to_string()
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            recency_window_days: default_recency_window_days(),
            recency_floor: 0.0,
            min_segment_size: default_min_segment_size(),
            max_segment_size: default_max_segment_size(),
            aov_high_percentile: default_aov_high_percentile(),
            aov_medium_percentile: default_aov_medium_percentile(),
            engagement_high_threshold: default_engagement_high_threshold(),
            engagement_medium_threshold: default_engagement_medium_threshold(),
            profitability_high_threshold: default_profitability_high_threshold(),
            mid_activity_sessions: default_mid_activity_sessions(),
            weights: ScoringWeights::default(),
            strategic_fit: TierWeights::default(),
            lift_overrides: BTreeMap::new(),
            resolution: ResolutionPolicy::default(),
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            conversion_potential: default_weight_conversion(),
            lift_vs_control: default_weight_lift(),
            size_score: default_weight_minor(),
            profitability: default_weight_minor(),
            strategic_fit: default_weight_minor(),
        }
    }
}

impl Default for TierWeights {
    fn default() -> Self {
        Self {
            high: default_fit_high(),
            medium: default_fit_medium(),
            low: default_fit_low(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            prefix: default_output_prefix(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            segmentation: SegmentationConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.conversion_potential
            + self.lift_vs_control
            + self.size_score
            + self.profitability
            + self.strategic_fit
    }

    fn entries(&self) -> [(&'static str, f64); 5] {
        [
            ("conversion_potential", self.conversion_potential),
            ("lift_vs_control", self.lift_vs_control),
            ("size_score", self.size_score),
            ("profitability", self.profitability),
            ("strategic_fit", self.strategic_fit),
        ]
    }
}

impl TierWeights {
    pub fn for_tier(&self, tier: ValueTier) -> f64 {
        match tier {
            ValueTier::High => self.high,
            ValueTier::Medium => self.medium,
            ValueTier::Low => self.low,
        }
    }
}

fn check_unit(errors: &mut Vec<String>, name: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(format!("{name} must be between 0 and 1 (got {value})"));
    }
}

impl SegmentationConfig {
    /// Window length, clamped to `[0, MAX_RECENCY_WINDOW_DAYS]` for
    /// configurations that skipped `validate()`.
    pub fn recency_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.recency_window_days.clamp(0, MAX_RECENCY_WINDOW_DAYS))
    }

    /// Reject the configuration before any processing if a bound, threshold
    /// or weight is out of range. All problems are reported together.
    pub fn validate(&self) -> SegmentationResult<()> {
        let mut errors = Vec::new();

        if self.recency_window_days <= 0 {
            errors.push("recency_window_days must be positive".to_string());
        } else if self.recency_window_days > MAX_RECENCY_WINDOW_DAYS {
            errors.push(format!(
                "recency_window_days must not exceed {MAX_RECENCY_WINDOW_DAYS} (got {})",
                self.recency_window_days
            ));
        }
        check_unit(&mut errors, "recency_floor", self.recency_floor);

        if self.min_segment_size == 0 {
            errors.push("min_segment_size must be positive".to_string());
        }
        if self.min_segment_size > self.max_segment_size {
            errors.push(format!(
                "min_segment_size ({}) must not exceed max_segment_size ({})",
                self.min_segment_size, self.max_segment_size
            ));
        }

        for (name, value) in [
            ("aov_high_percentile", self.aov_high_percentile),
            ("aov_medium_percentile", self.aov_medium_percentile),
        ] {
            if !(value > 0.0 && value < 100.0) {
                errors.push(format!("{name} must be strictly between 0 and 100 (got {value})"));
            }
        }
        if self.aov_medium_percentile >= self.aov_high_percentile {
            errors.push("aov_medium_percentile must be below aov_high_percentile".to_string());
        }

        check_unit(&mut errors, "engagement_high_threshold", self.engagement_high_threshold);
        check_unit(&mut errors, "engagement_medium_threshold", self.engagement_medium_threshold);
        check_unit(&mut errors, "profitability_high_threshold", self.profitability_high_threshold);
        if self.engagement_medium_threshold > self.engagement_high_threshold {
            errors.push(
                "engagement_medium_threshold must not exceed engagement_high_threshold".to_string(),
            );
        }

        for (name, weight) in self.weights.entries() {
            if weight < 0.0 {
                errors.push(format!("weight {name} must not be negative (got {weight})"));
            }
        }
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            errors.push(format!("scoring weights must sum to 1.0 (got {sum:.6})"));
        }

        for tier in ValueTier::ALL {
            check_unit(
                &mut errors,
                &format!("strategic_fit.{tier}"),
                self.strategic_fit.for_tier(tier),
            );
        }
        for (label, lift) in &self.lift_overrides {
            check_unit(&mut errors, &format!("lift_overrides.{label}"), *lift);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            tracing::warn!(problems = errors.len(), "Segmentation config rejected");
            Err(SegmentationError::Configuration(errors))
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, e.g.
    /// `MECE__SEGMENTATION__MIN_SEGMENT_SIZE=250`.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("MECE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
