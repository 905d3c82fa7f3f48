//! Rule tables for the segment decision tree. Each tier is an ordered list of
//! (conditions, segment) rules evaluated first-match-wins; the last rule of
//! every tier has no conditions.

use mece_core::{SegmentName, SegmentationConfig, UserRecord, ValueTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Engagement,
    Profitability,
    Sessions,
}

/// Symbolic threshold, resolved against the run's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    EngagementHigh,
    EngagementMedium,
    ProfitabilityHigh,
    ActivitySessions,
}

/// `metric >= threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub metric: Metric,
    pub threshold: Threshold,
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub conditions: &'static [Condition],
    pub segment: SegmentName,
}

const fn at_least(metric: Metric, threshold: Threshold) -> Condition {
    Condition { metric, threshold }
}

const ENGAGEMENT_HIGH: Condition = at_least(Metric::Engagement, Threshold::EngagementHigh);
const ENGAGEMENT_MEDIUM: Condition = at_least(Metric::Engagement, Threshold::EngagementMedium);
const PROFITABILITY_HIGH: Condition = at_least(Metric::Profitability, Threshold::ProfitabilityHigh);
const ACTIVE: Condition = at_least(Metric::Sessions, Threshold::ActivitySessions);

const HIGH_RULES: &[Rule] = &[
    Rule {
        conditions: &[ENGAGEMENT_HIGH],
        segment: SegmentName::PremiumEngaged,
    },
    Rule {
        conditions: &[PROFITABILITY_HIGH],
        segment: SegmentName::PremiumProfitable,
    },
    Rule {
        conditions: &[],
        segment: SegmentName::PremiumOther,
    },
];

const MEDIUM_RULES: &[Rule] = &[
    Rule {
        conditions: &[ENGAGEMENT_HIGH, PROFITABILITY_HIGH],
        segment: SegmentName::MidValueChampions,
    },
    Rule {
        conditions: &[ENGAGEMENT_HIGH],
        segment: SegmentName::MidValueEngaged,
    },
    Rule {
        conditions: &[ACTIVE],
        segment: SegmentName::MidValueActive,
    },
    Rule {
        conditions: &[],
        segment: SegmentName::MidValueOther,
    },
];

const LOW_RULES: &[Rule] = &[
    Rule {
        conditions: &[ENGAGEMENT_HIGH],
        segment: SegmentName::LowValueHighEngagement,
    },
    Rule {
        conditions: &[ENGAGEMENT_MEDIUM],
        segment: SegmentName::LowValueModerateEngaged,
    },
    Rule {
        conditions: &[],
        segment: SegmentName::LowValueOther,
    },
];

pub fn rules_for(tier: ValueTier) -> &'static [Rule] {
    match tier {
        ValueTier::High => HIGH_RULES,
        ValueTier::Medium => MEDIUM_RULES,
        ValueTier::Low => LOW_RULES,
    }
}

/// The rule that assigns `segment`.
pub fn rule_for(segment: SegmentName) -> &'static Rule {
    let rules = rules_for(segment.tier());
    &rules[segment.rule_index()]
}

impl Threshold {
    pub fn value(self, config: &SegmentationConfig) -> f64 {
        match self {
            Threshold::EngagementHigh => config.engagement_high_threshold,
            Threshold::EngagementMedium => config.engagement_medium_threshold,
            Threshold::ProfitabilityHigh => config.profitability_high_threshold,
            Threshold::ActivitySessions => f64::from(config.mid_activity_sessions),
        }
    }
}

impl Metric {
    pub fn read(self, record: &UserRecord) -> f64 {
        match self {
            Metric::Engagement => record.engagement_score,
            Metric::Profitability => record.profitability_score,
            Metric::Sessions => f64::from(record.sessions_last_30d),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Metric::Engagement => "Engagement",
            Metric::Profitability => "Profitability",
            Metric::Sessions => "Sessions",
        }
    }
}

impl Condition {
    pub fn holds(&self, record: &UserRecord, config: &SegmentationConfig) -> bool {
        self.metric.read(record) >= self.threshold.value(config)
    }

    pub fn describe(&self, config: &SegmentationConfig) -> String {
        format!("{} >= {}", self.metric.label(), self.threshold.value(config))
    }
}

impl Rule {
    pub fn is_fallback(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, record: &UserRecord, config: &SegmentationConfig) -> bool {
        self.conditions.iter().all(|c| c.holds(record, config))
    }

    pub fn describe(&self, config: &SegmentationConfig) -> String {
        if self.is_fallback() {
            return "Other conditions".to_string();
        }
        self.conditions
            .iter()
            .map(|c| c.describe(config))
            .collect::<Vec<_>>()
            .join(" & ")
    }
}

/// First rule of `tier` matching `record`. Always succeeds because every
/// tier ends with a fallback.
pub fn first_match(tier: ValueTier, record: &UserRecord, config: &SegmentationConfig) -> SegmentName {
    rules_for(tier)
        .iter()
        .find(|rule| rule.matches(record, config))
        .map(|rule| rule.segment)
        .unwrap_or_else(|| tier.catch_all())
}
