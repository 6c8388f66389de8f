//! Versioned metric weights and advisory learning insights.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lower clamp for learned weights.
pub const WEIGHT_MIN: f64 = 0.1;
/// Upper clamp for learned weights.
pub const WEIGHT_MAX: f64 = 3.0;
/// Lower clamp for learned confidence.
pub const CONFIDENCE_MIN: f64 = 0.1;
/// Upper clamp for learned confidence.
pub const CONFIDENCE_MAX: f64 = 1.0;

/// Identity of a learned-weight series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeightKey {
    pub agent_type: String,
    pub metric_type: String,
    pub metric_subtype: Option<String>,
    pub category: Option<String>,
    /// Optional narrowing tag (campaign id, region, ...).
    pub scope: Option<String>,
}

impl WeightKey {
    pub fn new(agent_type: impl Into<String>, metric_type: impl Into<String>) -> Self {
        Self {
            agent_type: agent_type.into(),
            metric_type: metric_type.into(),
            metric_subtype: None,
            category: None,
            scope: None,
        }
    }
}

impl std::fmt::Display for WeightKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.agent_type, self.metric_type)?;
        if let Some(ref sub) = self.metric_subtype {
            write!(f, "/{sub}")?;
        }
        if let Some(ref cat) = self.category {
            write!(f, "[{cat}]")?;
        }
        if let Some(ref scope) = self.scope {
            write!(f, "@{scope}")?;
        }
        Ok(())
    }
}

/// One immutable version of a learned weight/threshold/confidence record.
///
/// Exactly one version per key is active at any time; prior versions are
/// deactivated and linked as predecessors, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricWeight {
    pub id: Uuid,
    pub key: WeightKey,
    /// Influence multiplier, clamped to `[WEIGHT_MIN, WEIGHT_MAX]`.
    pub weight: f64,
    /// Learned "bad beyond this" value, when one has been calibrated.
    pub threshold: Option<f64>,
    /// Trust in this record, clamped to `[CONFIDENCE_MIN, CONFIDENCE_MAX]`.
    pub confidence: f64,
    pub sample_size: u64,
    /// `max(0, 1 - coefficient_of_variation)` of recent trigger values.
    pub stability: f64,
    pub version: u32,
    pub previous_version: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl MetricWeight {
    /// Seed version 1 for an unseen key.
    pub fn seed(key: WeightKey, threshold: Option<f64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            weight: 1.0,
            threshold,
            confidence: 0.5,
            sample_size: 0,
            stability: 0.5,
            version: 1,
            previous_version: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Build the successor version with updated values; the caller persists
    /// it through `WeightStore::put_version`, which deactivates `self`.
    pub fn next_version(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: self.key.clone(),
            weight: self.weight,
            threshold: self.threshold,
            confidence: self.confidence,
            sample_size: self.sample_size,
            stability: self.stability,
            version: self.version + 1,
            previous_version: Some(self.id),
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// Kind of advisory insight produced by the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    PerformanceAnomaly,
    ThresholdOptimization,
}

impl InsightKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerformanceAnomaly => "performance_anomaly",
            Self::ThresholdOptimization => "threshold_optimization",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "performance_anomaly" => Some(Self::PerformanceAnomaly),
            "threshold_optimization" => Some(Self::ThresholdOptimization),
            _ => None,
        }
    }
}

/// Priority of an insight, for operator triage only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightPriority {
    High,
    Medium,
    Low,
}

impl InsightPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// A derived, human-readable recommendation. Advisory only: insights never
/// feed back into rules automatically, and are never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningInsight {
    pub id: Uuid,
    pub kind: InsightKind,
    pub priority: InsightPriority,
    pub key: WeightKey,
    pub title: String,
    pub detail: String,
    pub confidence: f64,
    pub expected_impact: f64,
    pub evidence_count: u64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_version_links_predecessor() {
        let seed = MetricWeight::seed(WeightKey::new("ppc", "cost_per_click"), Some(5.0));
        let next = seed.next_version();
        assert_eq!(next.version, 2);
        assert_eq!(next.previous_version, Some(seed.id));
        assert!(next.active);
    }

    #[test]
    fn weight_key_display_includes_narrowing_tags() {
        let mut key = WeightKey::new("email", "open_rate");
        key.category = Some("newsletter".to_string());
        key.scope = Some("us-east".to_string());
        assert_eq!(key.to_string(), "email/open_rate[newsletter]@us-east");
    }
}
