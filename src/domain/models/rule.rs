//! Trigger rules: scope filters, conditions, and firing bookkeeping.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::trigger::ActionPriority;

/// Comparison applied by a trigger condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    GreaterThan,
    LessThan,
    Equals,
    ChangePercent,
    /// Alias for `GreaterThan` that makes the consecutive-run requirement
    /// explicit in stored rules.
    ConsecutiveViolations,
}

impl ConditionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::Equals => "equals",
            Self::ChangePercent => "change_percent",
            Self::ConsecutiveViolations => "consecutive_violations",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "greater_than" => Some(Self::GreaterThan),
            "less_than" => Some(Self::LessThan),
            "equals" => Some(Self::Equals),
            "change_percent" => Some(Self::ChangePercent),
            "consecutive_violations" => Some(Self::ConsecutiveViolations),
            _ => None,
        }
    }
}

/// When a rule should fire, evaluated over recent metric observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerCondition {
    pub kind: ConditionKind,
    /// Comparison threshold. May be absent only for pure percent-change
    /// conditions, where it means "any nonzero change".
    pub threshold: Option<f64>,
    /// Lookback window; observations older than `now - window` are ignored.
    #[serde(default, with = "duration_secs")]
    pub window: Option<Duration>,
    /// Number of consecutive satisfying observations required. 1 means any
    /// single violation suffices.
    #[serde(default = "default_consecutive_count")]
    pub consecutive_count: u32,
}

const fn default_consecutive_count() -> u32 {
    1
}

/// (De)serialize `Option<Duration>` as whole seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs: Option<u64> = Option::deserialize(d)?;
        Ok(secs.map(Duration::from_secs))
    }
}

impl TriggerCondition {
    pub fn new(kind: ConditionKind, threshold: Option<f64>) -> Self {
        Self {
            kind,
            threshold,
            window: None,
            consecutive_count: 1,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_consecutive_count(mut self, count: u32) -> Self {
        self.consecutive_count = count;
        self
    }

    /// Check structural invariants: `consecutive_count >= 1`, and a
    /// threshold present for every kind except percent-change.
    pub fn validate(&self) -> DomainResult<()> {
        if self.consecutive_count < 1 {
            return Err(DomainError::ValidationFailed(
                "consecutive_count must be at least 1".to_string(),
            ));
        }
        if self.threshold.is_none() && self.kind != ConditionKind::ChangePercent {
            return Err(DomainError::ValidationFailed(format!(
                "condition kind '{}' requires a threshold",
                self.kind.as_str()
            )));
        }
        if let Some(t) = self.threshold {
            if !t.is_finite() {
                return Err(DomainError::ValidationFailed(
                    "threshold must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Scope filters restricting which metric observations a rule sees.
///
/// An absent field or empty allow-list means "match all".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleScope {
    pub agent_type: Option<String>,
    pub metric_type: Option<String>,
    pub metric_subtype: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub campaigns: Vec<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
}

impl RuleScope {
    pub fn for_metric(agent_type: impl Into<String>, metric_type: impl Into<String>) -> Self {
        Self {
            agent_type: Some(agent_type.into()),
            metric_type: Some(metric_type.into()),
            ..Self::default()
        }
    }
}

/// A declarative remediation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub scope: RuleScope,
    pub condition: TriggerCondition,
    /// Key into the action registry.
    pub action_type: String,
    /// Parameters merged into the executor's config map when the rule fires.
    #[serde(default)]
    pub action_params: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub priority: ActionPriority,
    /// Minimum time between consecutive firings.
    #[serde(default, with = "duration_secs")]
    pub cooldown: Option<Duration>,
    pub last_fired: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fire_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const fn default_enabled() -> bool {
    true
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        scope: RuleScope,
        condition: TriggerCondition,
        action_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            enabled: true,
            scope,
            condition,
            action_type: action_type.into(),
            action_params: serde_json::Map::new(),
            priority: ActionPriority::Medium,
            cooldown: None,
            last_fired: None,
            fire_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_priority(mut self, priority: ActionPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.action_params.insert(key.into(), value);
        self
    }

    /// True while the rule's cooldown window is still open.
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        match (self.cooldown, self.last_fired) {
            (Some(cooldown), Some(last)) => {
                (now - last).to_std().unwrap_or_default() < cooldown
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_requires_threshold_except_change_percent() {
        let cond = TriggerCondition::new(ConditionKind::GreaterThan, None);
        assert!(cond.validate().is_err());

        let cond = TriggerCondition::new(ConditionKind::ChangePercent, None);
        assert!(cond.validate().is_ok());
    }

    #[test]
    fn condition_rejects_zero_consecutive_count() {
        let mut cond = TriggerCondition::new(ConditionKind::LessThan, Some(1.0));
        cond.consecutive_count = 0;
        assert!(cond.validate().is_err());
    }

    #[test]
    fn cooldown_is_monotonic() {
        let mut rule = Rule::new(
            "cooldown-test",
            RuleScope::for_metric("ppc", "cost_per_click"),
            TriggerCondition::new(ConditionKind::GreaterThan, Some(5.0)),
            "pause_campaign",
        )
        .with_cooldown(Duration::from_secs(3600));

        let fired_at = Utc::now();
        rule.last_fired = Some(fired_at);

        assert!(rule.in_cooldown(fired_at + chrono::Duration::minutes(30)));
        assert!(!rule.in_cooldown(fired_at + chrono::Duration::minutes(61)));
    }

    #[test]
    fn rule_serde_round_trips_window_as_seconds() {
        let rule = Rule::new(
            "serde-test",
            RuleScope::default(),
            TriggerCondition::new(ConditionKind::Equals, Some(0.0))
                .with_window(Duration::from_secs(7200)),
            "notify_team",
        );

        let json = serde_json::to_string(&rule).unwrap();
        let back: Rule = serde_json::from_str(&json).unwrap();
        assert_eq!(back.condition.window, Some(Duration::from_secs(7200)));
        assert_eq!(back.condition.consecutive_count, 1);
    }
}
