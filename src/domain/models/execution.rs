//! Action execution: parameters, per-attempt results, and the durable log.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::trigger::ActionPriority;

/// Context attached to every action invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionMetadata {
    pub rule_id: Option<Uuid>,
    pub triggered_at: DateTime<Utc>,
    pub priority: ActionPriority,
}

/// Parameters handed to an `ActionExecutor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionParams {
    pub agent_name: String,
    pub agent_type: String,
    pub campaign_id: Option<String>,
    pub metric_id: Option<Uuid>,
    pub trigger_value: Option<f64>,
    pub threshold: Option<f64>,
    /// Free-form executor configuration, merged from the rule's
    /// `action_params` (or the manual-trigger config).
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    pub metadata: ActionMetadata,
}

impl ActionParams {
    pub fn manual(agent_type: impl Into<String>, priority: ActionPriority) -> Self {
        let agent_type = agent_type.into();
        Self {
            agent_name: agent_type.clone(),
            agent_type,
            campaign_id: None,
            metric_id: None,
            trigger_value: None,
            threshold: None,
            config: serde_json::Map::new(),
            metadata: ActionMetadata {
                rule_id: None,
                triggered_at: Utc::now(),
                priority,
            },
        }
    }
}

/// Outcome of one execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    pub data: Option<serde_json::Value>,
    /// Captured state needed to reverse the action later.
    pub rollback_data: Option<serde_json::Value>,
    /// Normalized relative deltas observed after the action, keyed by metric.
    pub impact_metrics: Option<HashMap<String, f64>>,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            rollback_data: None,
            impact_metrics: None,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            rollback_data: None,
            impact_metrics: None,
            error: Some(error.into()),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_rollback_data(mut self, data: serde_json::Value) -> Self {
        self.rollback_data = Some(data);
        self
    }

    pub fn with_impact_metrics(mut self, metrics: HashMap<String, f64>) -> Self {
        self.impact_metrics = Some(metrics);
        self
    }
}

/// Terminal state of a scheduled trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Completed,
    Failed,
    Skipped,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

/// Durable record of one settled trigger (only the final attempt's result).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub rule_id: Option<Uuid>,
    pub rule_name: Option<String>,
    pub action_type: String,
    pub agent_type: String,
    pub metric_type: Option<String>,
    pub metric_subtype: Option<String>,
    pub category: Option<String>,
    pub campaign_id: Option<String>,
    pub trigger_value: Option<f64>,
    pub threshold: Option<f64>,
    pub priority: ActionPriority,
    pub status: ExecutionStatus,
    /// Total attempts made, including the first.
    pub attempts: u32,
    pub result: ExecutionResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One reason an action failed within a pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDetail {
    pub action_type: String,
    pub rule_name: Option<String>,
    pub reason: String,
}

/// Per-pass summary, produced regardless of how many actions failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub triggered: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<FailureDetail>,
}

impl RunSummary {
    pub fn skipped_pass(count: usize) -> Self {
        Self {
            skipped: count,
            ..Self::default()
        }
    }
}

/// A completed scheduler pass: summary plus the records it produced.
#[derive(Debug, Clone, Default)]
pub struct PassOutcome {
    pub summary: RunSummary,
    pub records: Vec<ExecutionRecord>,
}

/// Aggregate counts for one action or agent type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsBucket {
    pub key: String,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Rolling-window execution statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsReport {
    pub window_hours: u64,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub by_action_type: Vec<StatsBucket>,
    pub by_agent_type: Vec<StatsBucket>,
}
