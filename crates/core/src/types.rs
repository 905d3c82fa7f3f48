use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One cart-abandoning user as supplied by the data source. Read-only to the
/// pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    #[serde(rename = "cart_abandoned_date")]
    pub cart_abandoned_at: Option<DateTime<Utc>>,
    #[serde(rename = "last_order_date", default)]
    pub last_order_at: Option<DateTime<Utc>>,
    pub avg_order_value: f64,
    pub sessions_last_30d: u32,
    pub num_cart_items: u32,
    pub engagement_score: f64,
    pub profitability_score: f64,
}

/// Value band derived from AOV percentiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueTier {
    High,
    Medium,
    Low,
}

impl ValueTier {
    pub const ALL: [ValueTier; 3] = [ValueTier::High, ValueTier::Medium, ValueTier::Low];

    /// Segments of this tier in rule evaluation order. The last entry is the
    /// tier's fallback.
    pub fn segments(self) -> &'static [SegmentName] {
        match self {
            ValueTier::High => &[
                SegmentName::PremiumEngaged,
                SegmentName::PremiumProfitable,
                SegmentName::PremiumOther,
            ],
            ValueTier::Medium => &[
                SegmentName::MidValueChampions,
                SegmentName::MidValueEngaged,
                SegmentName::MidValueActive,
                SegmentName::MidValueOther,
            ],
            ValueTier::Low => &[
                SegmentName::LowValueHighEngagement,
                SegmentName::LowValueModerateEngaged,
                SegmentName::LowValueOther,
            ],
        }
    }

    pub fn catch_all(self) -> SegmentName {
        match self {
            ValueTier::High => SegmentName::PremiumOther,
            ValueTier::Medium => SegmentName::MidValueOther,
            ValueTier::Low => SegmentName::LowValueOther,
        }
    }
}

impl fmt::Display for ValueTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueTier::High => "high",
            ValueTier::Medium => "medium",
            ValueTier::Low => "low",
        };
        f.write_str(s)
    }
}

/// The closed taxonomy of ten segment names. Declaration order follows the
/// decision tree, tier by tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentName {
    PremiumEngaged,
    PremiumProfitable,
    PremiumOther,
    MidValueChampions,
    MidValueEngaged,
    MidValueActive,
    MidValueOther,
    LowValueHighEngagement,
    LowValueModerateEngaged,
    LowValueOther,
}

impl SegmentName {
    pub const ALL: [SegmentName; 10] = [
        SegmentName::PremiumEngaged,
        SegmentName::PremiumProfitable,
        SegmentName::PremiumOther,
        SegmentName::MidValueChampions,
        SegmentName::MidValueEngaged,
        SegmentName::MidValueActive,
        SegmentName::MidValueOther,
        SegmentName::LowValueHighEngagement,
        SegmentName::LowValueModerateEngaged,
        SegmentName::LowValueOther,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SegmentName::PremiumEngaged => "Premium_Engaged",
            SegmentName::PremiumProfitable => "Premium_Profitable",
            SegmentName::PremiumOther => "Premium_Other",
            SegmentName::MidValueChampions => "Mid_Value_Champions",
            SegmentName::MidValueEngaged => "Mid_Value_Engaged",
            SegmentName::MidValueActive => "Mid_Value_Active",
            SegmentName::MidValueOther => "Mid_Value_Other",
            SegmentName::LowValueHighEngagement => "Low_Value_High_Engagement",
            SegmentName::LowValueModerateEngaged => "Low_Value_Moderate_Engaged",
            SegmentName::LowValueOther => "Low_Value_Other",
        }
    }

    pub fn tier(self) -> ValueTier {
        match self {
            SegmentName::PremiumEngaged
            | SegmentName::PremiumProfitable
            | SegmentName::PremiumOther => ValueTier::High,
            SegmentName::MidValueChampions
            | SegmentName::MidValueEngaged
            | SegmentName::MidValueActive
            | SegmentName::MidValueOther => ValueTier::Medium,
            SegmentName::LowValueHighEngagement
            | SegmentName::LowValueModerateEngaged
            | SegmentName::LowValueOther => ValueTier::Low,
        }
    }

    pub fn is_catch_all(self) -> bool {
        self.tier().catch_all() == self
    }

    /// Position of this segment within its tier's rule list.
    pub fn rule_index(self) -> usize {
        self.tier()
            .segments()
            .iter()
            .position(|s| *s == self)
            .unwrap_or_default()
    }
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SegmentName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown segment name: {s}"))
    }
}

/// Successor produced when an oversized segment is split by engagement rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SplitHalf {
    /// Higher-engagement half.
    A,
    B,
}

impl SplitHalf {
    pub fn suffix(self) -> &'static str {
        match self {
            SplitHalf::A => "_A",
            SplitHalf::B => "_B",
        }
    }
}

/// Segment label carried by a classified record: one of the ten names,
/// optionally suffixed by a split half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SegmentLabel {
    pub name: SegmentName,
    pub half: Option<SplitHalf>,
}

impl SegmentLabel {
    pub fn new(name: SegmentName) -> Self {
        Self { name, half: None }
    }

    pub fn split(name: SegmentName, half: SplitHalf) -> Self {
        Self {
            name,
            half: Some(half),
        }
    }

    pub fn tier(&self) -> ValueTier {
        self.name.tier()
    }

    pub fn is_catch_all(&self) -> bool {
        self.half.is_none() && self.name.is_catch_all()
    }
}

impl From<SegmentName> for SegmentLabel {
    fn from(name: SegmentName) -> Self {
        SegmentLabel::new(name)
    }
}

impl fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())?;
        if let Some(half) = self.half {
            f.write_str(half.suffix())?;
        }
        Ok(())
    }
}

impl FromStr for SegmentLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for half in [SplitHalf::A, SplitHalf::B] {
            if let Some(base) = s.strip_suffix(half.suffix()) {
                return Ok(SegmentLabel::split(base.parse()?, half));
            }
        }
        Ok(SegmentLabel::new(s.parse()?))
    }
}

impl From<SegmentLabel> for String {
    fn from(label: SegmentLabel) -> Self {
        label.to_string()
    }
}

impl TryFrom<String> for SegmentLabel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A universe member together with the fields derived during one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    pub record: UserRecord,
    pub recency_score: f64,
    pub segment: Option<SegmentLabel>,
}

/// AOV cut points computed from the universe's distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub high: f64,
    pub medium: f64,
}

impl TierThresholds {
    pub fn tier_for(&self, avg_order_value: f64) -> ValueTier {
        if avg_order_value > self.high {
            ValueTier::High
        } else if avg_order_value > self.medium {
            ValueTier::Medium
        } else {
            ValueTier::Low
        }
    }
}

/// An undersized label folded into another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub from: SegmentLabel,
    pub into: SegmentLabel,
    pub moved: usize,
}

/// An oversized label divided into `_A`/`_B` successors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRecord {
    pub from: SegmentLabel,
    pub a_size: usize,
    pub b_size: usize,
}

/// What the size constraint resolver changed during one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionLog {
    pub merges: Vec<MergeRecord>,
    pub splits: Vec<SplitRecord>,
}

impl ResolutionLog {
    pub fn is_empty(&self) -> bool {
        self.merges.is_empty() && self.splits.is_empty()
    }

    /// Labels that were merged into `target`.
    pub fn absorbed_by(&self, target: &SegmentLabel) -> Vec<SegmentLabel> {
        self.merges
            .iter()
            .filter(|m| &m.into == target)
            .map(|m| m.from)
            .collect()
    }
}

/// Scored, exportable summary of one final segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub segment_name: String,
    pub tier: ValueTier,
    pub rules_applied: String,
    pub size: usize,
    pub conversion_potential: f64,
    pub lift_vs_control: f64,
    pub size_score: f64,
    pub profitability: f64,
    pub strategic_fit: f64,
    pub overall_score: f64,
    pub valid: bool,
    pub avg_aov: f64,
    pub avg_engagement: f64,
    pub avg_sessions: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_from: Vec<String>,
}
