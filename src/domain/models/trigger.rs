//! Action triggers emitted by the evaluator and consumed by the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::execution::ActionParams;

/// Execution priority of a remediation action.
///
/// Variant order is significant: `Emergency` sorts first, so ascending
/// iteration over a `BTreeMap<ActionPriority, _>` yields groups from most
/// to least urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    Emergency,
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl ActionPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "emergency" => Some(Self::Emergency),
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The evaluator's output: one firing of one rule.
///
/// Created per evaluation pass, consumed once by the scheduler, then
/// discarded; only the resulting execution record is durable.
#[derive(Debug, Clone)]
pub struct ActionTrigger {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub action_type: String,
    pub priority: ActionPriority,
    pub params: ActionParams,
    /// Metric context of the observation that fired the rule; threaded into
    /// the execution log so the learner can key its adjustments.
    pub metric_type: Option<String>,
    pub metric_subtype: Option<String>,
    pub category: Option<String>,
    /// Earliest instant the rule may fire again.
    pub cooldown_until: Option<DateTime<Utc>>,
    pub triggered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_emergency_first() {
        let mut priorities = vec![
            ActionPriority::Low,
            ActionPriority::Emergency,
            ActionPriority::Medium,
            ActionPriority::Critical,
            ActionPriority::High,
        ];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![
                ActionPriority::Emergency,
                ActionPriority::Critical,
                ActionPriority::High,
                ActionPriority::Medium,
                ActionPriority::Low,
            ]
        );
    }

    #[test]
    fn priority_round_trips_as_str() {
        for p in [
            ActionPriority::Emergency,
            ActionPriority::Critical,
            ActionPriority::High,
            ActionPriority::Medium,
            ActionPriority::Low,
        ] {
            assert_eq!(ActionPriority::parse(p.as_str()), Some(p));
        }
        assert_eq!(ActionPriority::parse("urgent"), None);
    }
}
