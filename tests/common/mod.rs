//! Shared helpers for integration tests: in-memory port implementations and
//! a scripted executor with observable call history.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use adwatch::domain::models::{
    ActionMetadata, ActionParams, ActionPriority, ActionTrigger, ConditionKind, ExecutionRecord,
    ExecutionResult, ExecutionStatus, MetricObservation, Rule, RuleScope, StatsReport,
    TriggerCondition, WeightKey,
};
use adwatch::domain::ports::{ActionExecutor, ExecutionLog, RuleStore};
use adwatch::domain::{DomainError, DomainResult};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn make_rule(name: &str, threshold: f64, action_type: &str) -> Rule {
    Rule::new(
        name,
        RuleScope::for_metric("ppc", "cost_per_click"),
        TriggerCondition::new(ConditionKind::GreaterThan, Some(threshold)),
        action_type,
    )
}

pub fn make_observation(value: f64) -> MetricObservation {
    MetricObservation::new("ppc", "cost_per_click", value).with_campaign("cmp-1")
}

pub fn make_trigger(rule: &Rule, priority: ActionPriority, value: f64) -> ActionTrigger {
    let now = Utc::now();
    ActionTrigger {
        rule_id: rule.id,
        rule_name: rule.name.clone(),
        action_type: rule.action_type.clone(),
        priority,
        params: ActionParams {
            agent_name: "ppc".to_string(),
            agent_type: "ppc".to_string(),
            campaign_id: Some("cmp-1".to_string()),
            metric_id: Some(Uuid::new_v4()),
            trigger_value: Some(value),
            threshold: rule.condition.threshold,
            config: rule.action_params.clone(),
            metadata: ActionMetadata {
                rule_id: Some(rule.id),
                triggered_at: now,
                priority,
            },
        },
        metric_type: Some("cost_per_click".to_string()),
        metric_subtype: None,
        category: None,
        cooldown_until: None,
        triggered_at: now,
    }
}

// ---------------------------------------------------------------------------
// Scripted executor
// ---------------------------------------------------------------------------

/// One scripted attempt outcome.
#[derive(Debug, Clone)]
pub enum Scripted {
    Succeed,
    Fail,
    Error,
}

/// Executor that plays back a script of attempt outcomes and records every
/// call in a shared event log (`start:<action>` / `end:<action>`).
pub struct ScriptedExecutor {
    action_type: String,
    script: Mutex<VecDeque<Scripted>>,
    max_retries: u32,
    calls: AtomicU32,
    events: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl ScriptedExecutor {
    pub fn new(action_type: &str, script: Vec<Scripted>) -> Self {
        Self {
            action_type: action_type.to_string(),
            script: Mutex::new(script.into()),
            max_retries: 3,
            calls: AtomicU32::new(0),
            events: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Share an event log across executors to observe execution ordering.
    pub fn with_events(mut self, events: Arc<Mutex<Vec<String>>>) -> Self {
        self.events = events;
        self
    }

    /// Hold each execution open for the given duration.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Arc<Mutex<Vec<String>>> {
        self.events.clone()
    }
}

#[async_trait]
impl ActionExecutor for ScriptedExecutor {
    fn action_type(&self) -> &str {
        &self.action_type
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    async fn validate(&self, _params: &ActionParams) -> DomainResult<bool> {
        Ok(true)
    }

    async fn execute(&self, _params: &ActionParams) -> DomainResult<ExecutionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap()
            .push(format!("start:{}", self.action_type));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Scripted::Succeed);
        self.events
            .lock()
            .unwrap()
            .push(format!("end:{}", self.action_type));

        match outcome {
            Scripted::Succeed => Ok(ExecutionResult::ok("scripted success")),
            Scripted::Fail => Ok(ExecutionResult::failed("scripted failure", "transient")),
            Scripted::Error => Err(DomainError::ExecutionFailure("scripted error".to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory RuleStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRuleStore {
    rules: Mutex<HashMap<Uuid, Rule>>,
}

impl MemoryRuleStore {
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules: Mutex::new(rules.into_iter().map(|r| (r.id, r)).collect()),
        }
    }

    pub fn fire_count(&self, id: Uuid) -> u64 {
        self.rules
            .lock()
            .unwrap()
            .get(&id)
            .map_or(0, |r| r.fire_count)
    }

    pub fn last_fired(&self, id: Uuid) -> Option<DateTime<Utc>> {
        self.rules.lock().unwrap().get(&id).and_then(|r| r.last_fired)
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn create(&self, rule: &Rule) -> DomainResult<()> {
        self.rules.lock().unwrap().insert(rule.id, rule.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Rule>> {
        Ok(self.rules.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Rule>> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn update(&self, rule: &Rule) -> DomainResult<()> {
        self.rules.lock().unwrap().insert(rule.id, rule.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        self.rules.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Rule>> {
        Ok(self.rules.lock().unwrap().values().cloned().collect())
    }

    async fn list_active(&self) -> DomainResult<Vec<Rule>> {
        let mut active: Vec<Rule> = self
            .rules
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.enabled)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.priority.cmp(&b.priority));
        Ok(active)
    }

    async fn set_enabled(&self, id: Uuid, enabled: bool) -> DomainResult<bool> {
        let mut rules = self.rules.lock().unwrap();
        match rules.get_mut(&id) {
            Some(rule) => {
                rule.enabled = enabled;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_fired(&self, id: Uuid, fired_at: DateTime<Utc>) -> DomainResult<()> {
        let mut rules = self.rules.lock().unwrap();
        let rule = rules.get_mut(&id).ok_or(DomainError::RuleNotFound(id))?;
        rule.last_fired = Some(fired_at);
        rule.fire_count += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory ExecutionLog
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryExecutionLog {
    records: Mutex<Vec<ExecutionRecord>>,
}

impl MemoryExecutionLog {
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionLog for MemoryExecutionLog {
    async fn append(&self, record: &ExecutionRecord) -> DomainResult<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<ExecutionRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn recent(
        &self,
        window: Duration,
        agent_type: Option<&str>,
        metric_type: Option<&str>,
    ) -> DomainResult<Vec<ExecutionRecord>> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::days(365));
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.started_at >= cutoff)
            .filter(|r| r.status != ExecutionStatus::Skipped)
            .filter(|r| agent_type.is_none_or(|a| r.agent_type == a))
            .filter(|r| metric_type.is_none_or(|m| r.metric_type.as_deref() == Some(m)))
            .cloned()
            .collect())
    }

    async fn success_rate(&self, key: &WeightKey, _window: Duration) -> DomainResult<Option<f64>> {
        let records = self.records.lock().unwrap();
        let matching: Vec<_> = records
            .iter()
            .filter(|r| r.agent_type == key.agent_type)
            .collect();
        if matching.is_empty() {
            return Ok(None);
        }
        let successes = matching.iter().filter(|r| r.result.success).count();
        Ok(Some(successes as f64 / matching.len() as f64))
    }

    async fn recent_trigger_values(
        &self,
        key: &WeightKey,
        _window: Duration,
        limit: u32,
    ) -> DomainResult<Vec<f64>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.agent_type == key.agent_type)
            .filter_map(|r| r.trigger_value)
            .take(limit as usize)
            .collect())
    }

    async fn stats(&self, window: Duration) -> DomainResult<StatsReport> {
        let records = self.recent(window, None, None).await?;
        let mut report = StatsReport {
            window_hours: window.as_secs() / 3600,
            ..StatsReport::default()
        };
        report.total = records.len() as u64;
        report.succeeded = records
            .iter()
            .filter(|r| r.status == ExecutionStatus::Completed)
            .count() as u64;
        report.failed = records
            .iter()
            .filter(|r| r.status == ExecutionStatus::Failed)
            .count() as u64;
        Ok(report)
    }

    async fn prune_older_than(&self, _retention: Duration) -> DomainResult<u64> {
        Ok(0)
    }
}
