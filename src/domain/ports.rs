//! Port traits: persistence boundaries and the action-executor capability.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    ActionParams, ActionPriority, ExecutionRecord, ExecutionResult, LearningInsight,
    MetricObservation, MetricQuery, MetricWeight, Rule, StatsReport, WeightKey,
};

/// Repository for trigger rules and their firing bookkeeping.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn create(&self, rule: &Rule) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Rule>>;

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Rule>>;

    async fn update(&self, rule: &Rule) -> DomainResult<()>;

    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    async fn list(&self) -> DomainResult<Vec<Rule>>;

    /// Enabled rules ordered by (priority desc, updated_at desc).
    async fn list_active(&self) -> DomainResult<Vec<Rule>>;

    async fn set_enabled(&self, id: Uuid, enabled: bool) -> DomainResult<bool>;

    /// Atomically set `last_fired` and increment `fire_count`. Called exactly
    /// once per settled trigger, never per retry attempt.
    async fn record_fired(&self, id: Uuid, fired_at: DateTime<Utc>) -> DomainResult<()>;
}

/// Source of recent metric observations.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Observations matching the query, ordered by `recorded_at` descending.
    async fn query(&self, query: &MetricQuery) -> DomainResult<Vec<MetricObservation>>;
}

/// Versioned store for learned weights and advisory insights.
///
/// Readers always see exactly one active version per key; `put_version`
/// swaps the active pointer atomically.
#[async_trait]
pub trait WeightStore: Send + Sync {
    async fn active(&self, key: &WeightKey) -> DomainResult<Option<MetricWeight>>;

    /// Insert a new version and deactivate its predecessor in one
    /// transaction. The new version must carry `active = true`.
    async fn put_version(&self, weight: &MetricWeight) -> DomainResult<()>;

    /// All versions for a key, newest first.
    async fn history(&self, key: &WeightKey) -> DomainResult<Vec<MetricWeight>>;

    async fn list_active(&self) -> DomainResult<Vec<MetricWeight>>;

    async fn record_insight(&self, insight: &LearningInsight) -> DomainResult<()>;

    async fn recent_insights(&self, limit: u32) -> DomainResult<Vec<LearningInsight>>;
}

/// Durable log of settled action executions.
#[async_trait]
pub trait ExecutionLog: Send + Sync {
    async fn append(&self, record: &ExecutionRecord) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<ExecutionRecord>>;

    /// Completed/failed records within the window, newest first, optionally
    /// narrowed by agent and metric type.
    async fn recent(
        &self,
        window: Duration,
        agent_type: Option<&str>,
        metric_type: Option<&str>,
    ) -> DomainResult<Vec<ExecutionRecord>>;

    /// Fraction of successful executions for a context within the window.
    /// `None` when there are no samples.
    async fn success_rate(&self, key: &WeightKey, window: Duration) -> DomainResult<Option<f64>>;

    /// Trigger values of recent executions for a context, newest first.
    async fn recent_trigger_values(
        &self,
        key: &WeightKey,
        window: Duration,
        limit: u32,
    ) -> DomainResult<Vec<f64>>;

    async fn stats(&self, window: Duration) -> DomainResult<StatsReport>;

    /// Delete records older than the retention window; returns rows removed.
    async fn prune_older_than(&self, retention: Duration) -> DomainResult<u64>;
}

/// Capability descriptor + operations for one remediation action type.
///
/// Implementations live outside the core (or in `adapters::executors` for
/// safe built-ins); the scheduler selects them by action type through the
/// registry, never by downcasting.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Key this executor is registered under.
    fn action_type(&self) -> &str;

    /// Agent types this executor can act for. Empty means "all".
    fn compatible_agent_types(&self) -> Vec<String> {
        Vec::new()
    }

    fn priority(&self) -> ActionPriority {
        ActionPriority::Medium
    }

    /// Additional attempts after the first failed one.
    fn max_retries(&self) -> u32 {
        3
    }

    /// Config keys that must be present for `validate` to pass.
    fn required_params(&self) -> Vec<String> {
        Vec::new()
    }

    fn optional_params(&self) -> Vec<String> {
        Vec::new()
    }

    /// Action type to suggest when this one is unavailable or keeps failing.
    fn fallback_action(&self) -> Option<String> {
        None
    }

    fn supports_rollback(&self) -> bool {
        false
    }

    /// Cheap parameter check before execution. Returning `Ok(false)` fails
    /// the trigger immediately, with no retry.
    async fn validate(&self, params: &ActionParams) -> DomainResult<bool>;

    /// Perform the action. A returned `Err` and an `Ok` result with
    /// `success = false` are both treated as failed attempts.
    async fn execute(&self, params: &ActionParams) -> DomainResult<ExecutionResult>;

    /// Reverse a previously successful execution using its captured
    /// `rollback_data`. Only invoked by external callers, never by the
    /// scheduler.
    async fn rollback(
        &self,
        _params: &ActionParams,
        _rollback_data: &serde_json::Value,
    ) -> DomainResult<ExecutionResult> {
        Err(crate::domain::errors::DomainError::RollbackUnsupported(
            self.action_type().to_string(),
        ))
    }
}

impl std::fmt::Debug for dyn ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("action_type", &self.action_type())
            .field("max_retries", &self.max_retries())
            .finish()
    }
}
