//! Priority-scheduled action execution with bounded concurrency and retries.
//!
//! One pass at a time: a compare-and-swap running flag suppresses concurrent
//! invocations (they return a skipped summary, they are not queued). Within a
//! pass, triggers are grouped by priority and groups run strictly in order;
//! inside a group, triggers execute in chunks of `max_concurrent_actions`.
//! Retries use exponential backoff capped at `max_delay_ms`. A pass can be
//! cancelled cooperatively between chunks, never mid-chunk.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::Utc;
use futures::future::join_all;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActionParams, ActionPriority, ActionTrigger, ExecutionRecord, ExecutionResult,
    ExecutionStatus, FailureDetail, PassOutcome, RetryConfig, RunSummary, SchedulerConfig,
};
use crate::domain::ports::{ActionExecutor, ExecutionLog, RuleStore};
use crate::services::alerts::AlertNotifier;
use crate::services::registry::ActionRegistry;

pub struct ExecutionScheduler {
    registry: Arc<ActionRegistry>,
    rules: Arc<dyn RuleStore>,
    log: Arc<dyn ExecutionLog>,
    retry: RetryConfig,
    max_concurrent: usize,
    running: AtomicBool,
    cancel: Arc<AtomicBool>,
    alerts: Option<Arc<AlertNotifier>>,
}

impl ExecutionScheduler {
    pub fn new(
        registry: Arc<ActionRegistry>,
        rules: Arc<dyn RuleStore>,
        log: Arc<dyn ExecutionLog>,
        scheduler: &SchedulerConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            registry,
            rules,
            log,
            retry,
            max_concurrent: scheduler.max_concurrent_actions.max(1),
            running: AtomicBool::new(false),
            cancel: Arc::new(AtomicBool::new(false)),
            alerts: None,
        }
    }

    pub fn with_alerts(mut self, alerts: Arc<AlertNotifier>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Shared flag that cancels the current pass between chunks.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Execute one batch of triggers. A concurrent invocation returns a
    /// skipped summary instead of overlapping the pass in flight.
    pub async fn run(&self, triggers: Vec<ActionTrigger>) -> PassOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(
                triggers = triggers.len(),
                "Execution pass already in flight; skipping"
            );
            return PassOutcome {
                summary: RunSummary::skipped_pass(triggers.len()),
                records: Vec::new(),
            };
        }

        let total = triggers.len();
        let outcome = match self.run_groups(triggers).await {
            Ok(records) => {
                let summary = summarize(total, &records);
                PassOutcome { summary, records }
            }
            Err(e) => {
                // A fault in the orchestration itself: report one failure
                // rather than losing the pass silently.
                tracing::error!(error = %e, "Scheduler fault during execution pass");
                PassOutcome {
                    summary: RunSummary {
                        triggered: total,
                        failed: 1,
                        failures: vec![FailureDetail {
                            action_type: "scheduler".to_string(),
                            rule_name: None,
                            reason: DomainError::SchedulerFault(e.to_string()).to_string(),
                        }],
                        ..RunSummary::default()
                    },
                    records: Vec::new(),
                }
            }
        };
        self.running.store(false, Ordering::SeqCst);

        if outcome.summary.failed > 0 {
            if let Some(ref alerts) = self.alerts {
                alerts.notify_failures(&outcome.summary).await;
            }
        }

        outcome
    }

    async fn run_groups(
        &self,
        triggers: Vec<ActionTrigger>,
    ) -> DomainResult<Vec<ExecutionRecord>> {
        let mut groups: BTreeMap<ActionPriority, Vec<ActionTrigger>> = BTreeMap::new();
        for trigger in triggers {
            groups.entry(trigger.priority).or_default().push(trigger);
        }

        let mut records = Vec::new();
        'groups: for (priority, group) in &groups {
            tracing::debug!(
                priority = %priority,
                count = group.len(),
                "Executing priority group"
            );
            for chunk in group.chunks(self.max_concurrent) {
                if self.cancel.load(Ordering::SeqCst) {
                    tracing::info!("Execution pass cancelled between chunks");
                    break 'groups;
                }
                let settled = join_all(chunk.iter().map(|t| self.execute_trigger(t))).await;
                records.extend(settled);
            }
        }
        Ok(records)
    }

    async fn execute_trigger(&self, trigger: &ActionTrigger) -> ExecutionRecord {
        let started_at = Utc::now();

        let (status, attempts, result) = match self.registry.get(&trigger.action_type) {
            None => {
                let reason = DomainError::UnknownActionType(trigger.action_type.clone());
                tracing::warn!(
                    rule_name = %trigger.rule_name,
                    action_type = %trigger.action_type,
                    "Trigger dropped: unknown action type"
                );
                (
                    ExecutionStatus::Failed,
                    0,
                    ExecutionResult::failed("no executor registered", reason.to_string()),
                )
            }
            Some(executor) => {
                self.validate_and_execute(&executor, &trigger.params).await
            }
        };

        // Bookkeeping happens exactly once per settled trigger, regardless of
        // how many attempts it took.
        if let Err(e) = self.rules.record_fired(trigger.rule_id, started_at).await {
            tracing::warn!(
                rule_id = %trigger.rule_id,
                error = %e,
                "Failed to persist rule fire state"
            );
        }

        let record = ExecutionRecord {
            id: Uuid::new_v4(),
            rule_id: Some(trigger.rule_id),
            rule_name: Some(trigger.rule_name.clone()),
            action_type: trigger.action_type.clone(),
            agent_type: trigger.params.agent_type.clone(),
            metric_type: trigger.metric_type.clone(),
            metric_subtype: trigger.metric_subtype.clone(),
            category: trigger.category.clone(),
            campaign_id: trigger.params.campaign_id.clone(),
            trigger_value: trigger.params.trigger_value,
            threshold: trigger.params.threshold,
            priority: trigger.priority,
            status,
            attempts,
            result,
            started_at,
            finished_at: Utc::now(),
        };

        if let Err(e) = self.log.append(&record).await {
            tracing::warn!(
                record_id = %record.id,
                error = %e,
                "Failed to append execution record"
            );
        }

        record
    }

    async fn validate_and_execute(
        &self,
        executor: &Arc<dyn ActionExecutor>,
        params: &ActionParams,
    ) -> (ExecutionStatus, u32, ExecutionResult) {
        match executor.validate(params).await {
            Ok(true) => {}
            Ok(false) => {
                let reason = DomainError::ValidationFailure {
                    action_type: executor.action_type().to_string(),
                    reason: "executor rejected parameters".to_string(),
                };
                return (
                    ExecutionStatus::Failed,
                    0,
                    ExecutionResult::failed("validation failed", reason.to_string()),
                );
            }
            Err(e) => {
                return (
                    ExecutionStatus::Failed,
                    0,
                    ExecutionResult::failed("validation failed", e.to_string()),
                );
            }
        }

        let (result, attempts) = self.execute_with_retry(executor, params).await;
        let status = if result.success {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        (status, attempts, result)
    }

    /// Run `execute` with up to `max_retries` additional attempts. A thrown
    /// error and a `success = false` result are retried identically; the
    /// returned result is whichever attempt last ran.
    async fn execute_with_retry(
        &self,
        executor: &Arc<dyn ActionExecutor>,
        params: &ActionParams,
    ) -> (ExecutionResult, u32) {
        let max_retries = executor.max_retries();
        let mut backoff = retry_backoff(&self.retry);
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let result = match executor.execute(params).await {
                Ok(result) => result,
                Err(e) => ExecutionResult::failed("execution error", e.to_string()),
            };

            if result.success || attempts > max_retries {
                return (result, attempts);
            }

            let delay = backoff
                .next_backoff()
                .unwrap_or(Duration::from_millis(self.retry.max_delay_ms));
            tracing::debug!(
                action_type = %executor.action_type(),
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Action attempt failed; backing off before retry"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Operator-initiated remediation, bypassing the evaluator. Still goes
    /// through validate/execute/retry and is logged like any other trigger.
    pub async fn trigger_action(
        &self,
        agent_type: &str,
        action_type: &str,
        config: serde_json::Map<String, serde_json::Value>,
        campaign_id: Option<String>,
    ) -> DomainResult<ExecutionRecord> {
        let executor = self
            .registry
            .get(action_type)
            .ok_or_else(|| DomainError::UnknownActionType(action_type.to_string()))?;

        let mut params = ActionParams::manual(agent_type, executor.priority());
        params.campaign_id = campaign_id;
        params.config = config;

        let started_at = Utc::now();
        let (status, attempts, result) = self.validate_and_execute(&executor, &params).await;

        let record = ExecutionRecord {
            id: Uuid::new_v4(),
            rule_id: None,
            rule_name: None,
            action_type: action_type.to_string(),
            agent_type: agent_type.to_string(),
            metric_type: None,
            metric_subtype: None,
            category: None,
            campaign_id: params.campaign_id.clone(),
            trigger_value: None,
            threshold: None,
            priority: executor.priority(),
            status,
            attempts,
            result,
            started_at,
            finished_at: Utc::now(),
        };

        self.log.append(&record).await?;
        Ok(record)
    }

    /// Reverse a previously successful action using its captured rollback
    /// payload. Never invoked automatically.
    pub async fn rollback(
        &self,
        action_type: &str,
        params: &ActionParams,
        rollback_data: &serde_json::Value,
    ) -> DomainResult<ExecutionResult> {
        let executor = self
            .registry
            .get(action_type)
            .ok_or_else(|| DomainError::UnknownActionType(action_type.to_string()))?;
        executor.rollback(params, rollback_data).await
    }
}

impl std::fmt::Debug for ExecutionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionScheduler")
            .field("max_concurrent", &self.max_concurrent)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Deterministic exponential backoff: delay before retry `i` is
/// `min(base_delay * multiplier^i, max_delay)`, no jitter.
fn retry_backoff(retry: &RetryConfig) -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: Duration::from_millis(retry.base_delay_ms),
        initial_interval: Duration::from_millis(retry.base_delay_ms),
        randomization_factor: 0.0,
        multiplier: retry.backoff_multiplier,
        max_interval: Duration::from_millis(retry.max_delay_ms),
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    }
}

fn summarize(triggered: usize, records: &[ExecutionRecord]) -> RunSummary {
    let mut summary = RunSummary {
        triggered,
        ..RunSummary::default()
    };
    for record in records {
        match record.status {
            ExecutionStatus::Completed => summary.succeeded += 1,
            ExecutionStatus::Failed => {
                summary.failed += 1;
                summary.failures.push(FailureDetail {
                    action_type: record.action_type.clone(),
                    rule_name: record.rule_name.clone(),
                    reason: record
                        .result
                        .error
                        .clone()
                        .unwrap_or_else(|| record.result.message.clone()),
                });
            }
            ExecutionStatus::Skipped => summary.skipped += 1,
        }
    }
    // Triggers the pass never reached (cancellation) count as skipped.
    summary.skipped += triggered.saturating_sub(records.len());
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delays_follow_capped_exponential_sequence() {
        let retry = RetryConfig {
            base_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            max_delay_ms: 300_000,
        };
        let mut backoff = retry_backoff(&retry);

        let mut delays = Vec::new();
        for _ in 0..8 {
            delays.push(backoff.next_backoff().unwrap().as_millis() as u64);
        }
        assert_eq!(
            delays,
            vec![5_000, 10_000, 20_000, 40_000, 80_000, 160_000, 300_000, 300_000]
        );
    }

    #[test]
    fn summary_counts_by_status_and_cancelled_remainder() {
        let mk = |status: ExecutionStatus| ExecutionRecord {
            id: Uuid::new_v4(),
            rule_id: None,
            rule_name: Some("r".to_string()),
            action_type: "pause_campaign".to_string(),
            agent_type: "ppc".to_string(),
            metric_type: None,
            metric_subtype: None,
            category: None,
            campaign_id: None,
            trigger_value: None,
            threshold: None,
            priority: ActionPriority::Medium,
            status,
            attempts: 1,
            result: if status == ExecutionStatus::Completed {
                ExecutionResult::ok("done")
            } else {
                ExecutionResult::failed("boom", "transient")
            },
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        let records = vec![mk(ExecutionStatus::Completed), mk(ExecutionStatus::Failed)];
        let summary = summarize(4, &records);
        assert_eq!(summary.triggered, 4);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].reason, "transient");
    }
}
