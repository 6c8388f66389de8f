//! Integration tests for the execution scheduler: retries, priority
//! ordering, the single-flight guard, and fire-count bookkeeping.

mod common;

use std::sync::Arc;
use std::time::Duration;

use adwatch::domain::models::{ActionPriority, ExecutionStatus, RetryConfig, SchedulerConfig};
use adwatch::domain::ports::RuleStore;
use adwatch::services::{ActionRegistry, ExecutionScheduler};

use common::{
    make_rule, make_trigger, MemoryExecutionLog, MemoryRuleStore, Scripted, ScriptedExecutor,
};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        base_delay_ms: 1,
        backoff_multiplier: 2.0,
        max_delay_ms: 10,
    }
}

fn scheduler_with(
    executors: Vec<ScriptedExecutor>,
    rules: Arc<MemoryRuleStore>,
    log: Arc<MemoryExecutionLog>,
    max_concurrent: usize,
    retry: RetryConfig,
) -> ExecutionScheduler {
    let mut registry = ActionRegistry::new();
    for executor in executors {
        registry.register(Arc::new(executor)).unwrap();
    }
    let config = SchedulerConfig {
        max_concurrent_actions: max_concurrent,
        ..SchedulerConfig::default()
    };
    ExecutionScheduler::new(Arc::new(registry), rules, log, &config, retry)
}

#[tokio::test(start_paused = true)]
async fn fail_fail_succeed_reports_third_attempt_with_two_delays() {
    let rules = Arc::new(MemoryRuleStore::default());
    let log = Arc::new(MemoryExecutionLog::default());
    let rule = make_rule("retry-rule", 5.0, "pause_campaign");
    rules.create(&rule).await.unwrap();

    let executor = ScriptedExecutor::new(
        "pause_campaign",
        vec![Scripted::Fail, Scripted::Fail, Scripted::Succeed],
    )
    .with_max_retries(3);

    let retry = RetryConfig {
        base_delay_ms: 5_000,
        backoff_multiplier: 2.0,
        max_delay_ms: 300_000,
    };
    let scheduler = scheduler_with(vec![executor], rules.clone(), log.clone(), 1, retry);

    let started = tokio::time::Instant::now();
    let outcome = scheduler
        .run(vec![make_trigger(&rule, ActionPriority::High, 6.2)])
        .await;

    // Exactly two backoff delays were observed: 5s then 10s of virtual time.
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_millis(15_000) && elapsed < Duration::from_millis(15_100),
        "elapsed {elapsed:?}"
    );

    assert_eq!(outcome.summary.succeeded, 1);
    assert_eq!(outcome.summary.failed, 0);
    let record = &outcome.records[0];
    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(record.attempts, 3);
    assert!(record.result.success);
}

#[tokio::test]
async fn exhausted_retries_surface_last_failure() {
    let rules = Arc::new(MemoryRuleStore::default());
    let log = Arc::new(MemoryExecutionLog::default());
    let rule = make_rule("always-fails", 5.0, "pause_campaign");
    rules.create(&rule).await.unwrap();

    let executor = ScriptedExecutor::new(
        "pause_campaign",
        vec![
            Scripted::Error,
            Scripted::Fail,
            Scripted::Error,
        ],
    )
    .with_max_retries(2);

    let scheduler =
        scheduler_with(vec![executor], rules.clone(), log.clone(), 1, fast_retry());
    let outcome = scheduler
        .run(vec![make_trigger(&rule, ActionPriority::High, 6.2)])
        .await;

    assert_eq!(outcome.summary.failed, 1);
    let record = &outcome.records[0];
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert_eq!(record.attempts, 3); // first attempt + 2 retries
    assert!(record
        .result
        .error
        .as_deref()
        .unwrap()
        .contains("scripted error"));
    assert_eq!(outcome.summary.failures.len(), 1);
}

#[tokio::test]
async fn fire_count_increments_once_per_trigger_not_per_retry() {
    let rules = Arc::new(MemoryRuleStore::default());
    let log = Arc::new(MemoryExecutionLog::default());
    let rule = make_rule("bookkeeping", 5.0, "pause_campaign");
    rules.create(&rule).await.unwrap();

    let executor = ScriptedExecutor::new(
        "pause_campaign",
        vec![Scripted::Fail, Scripted::Fail, Scripted::Succeed],
    )
    .with_max_retries(3);

    let scheduler =
        scheduler_with(vec![executor], rules.clone(), log.clone(), 1, fast_retry());
    scheduler
        .run(vec![make_trigger(&rule, ActionPriority::High, 6.2)])
        .await;

    assert_eq!(rules.fire_count(rule.id), 1);
    assert!(rules.last_fired(rule.id).is_some());
}

#[tokio::test]
async fn emergency_completes_before_low_starts_with_single_slot() {
    let rules = Arc::new(MemoryRuleStore::default());
    let log = Arc::new(MemoryExecutionLog::default());
    let emergency_rule = make_rule("emergency-rule", 5.0, "pause_campaign");
    let low_rule = make_rule("low-rule", 5.0, "generate_report");
    rules.create(&emergency_rule).await.unwrap();
    rules.create(&low_rule).await.unwrap();

    let events = Arc::new(std::sync::Mutex::new(Vec::new()));
    let emergency_exec = ScriptedExecutor::new("pause_campaign", vec![Scripted::Succeed])
        .with_events(events.clone())
        .with_delay(Duration::from_millis(20));
    let low_exec = ScriptedExecutor::new("generate_report", vec![Scripted::Succeed])
        .with_events(events.clone());

    let scheduler = scheduler_with(
        vec![emergency_exec, low_exec],
        rules.clone(),
        log.clone(),
        1,
        fast_retry(),
    );

    // Submit the LOW trigger first; group ordering must still run EMERGENCY
    // to completion before LOW begins.
    let outcome = scheduler
        .run(vec![
            make_trigger(&low_rule, ActionPriority::Low, 6.2),
            make_trigger(&emergency_rule, ActionPriority::Emergency, 6.2),
        ])
        .await;

    assert_eq!(outcome.summary.succeeded, 2);
    let order = events.lock().unwrap().clone();
    assert_eq!(
        order,
        vec![
            "start:pause_campaign",
            "end:pause_campaign",
            "start:generate_report",
            "end:generate_report",
        ]
    );
}

#[tokio::test]
async fn unknown_action_type_fails_without_retry() {
    let rules = Arc::new(MemoryRuleStore::default());
    let log = Arc::new(MemoryExecutionLog::default());
    let rule = make_rule("ghost-action", 5.0, "unregistered_action");
    rules.create(&rule).await.unwrap();

    let scheduler = scheduler_with(vec![], rules.clone(), log.clone(), 1, fast_retry());
    let outcome = scheduler
        .run(vec![make_trigger(&rule, ActionPriority::Medium, 6.2)])
        .await;

    assert_eq!(outcome.summary.failed, 1);
    let record = &outcome.records[0];
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert_eq!(record.attempts, 0);
    assert!(record
        .result
        .error
        .as_deref()
        .unwrap()
        .contains("unregistered_action"));
}

#[tokio::test]
async fn concurrent_run_is_skipped_not_queued() {
    let rules = Arc::new(MemoryRuleStore::default());
    let log = Arc::new(MemoryExecutionLog::default());
    let rule = make_rule("slow-rule", 5.0, "pause_campaign");
    rules.create(&rule).await.unwrap();

    let executor = ScriptedExecutor::new("pause_campaign", vec![Scripted::Succeed])
        .with_delay(Duration::from_millis(100));
    let scheduler = Arc::new(scheduler_with(
        vec![executor],
        rules.clone(),
        log.clone(),
        1,
        fast_retry(),
    ));

    let first = {
        let scheduler = scheduler.clone();
        let trigger = make_trigger(&rule, ActionPriority::High, 6.2);
        tokio::spawn(async move { scheduler.run(vec![trigger]).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = scheduler
        .run(vec![make_trigger(&rule, ActionPriority::High, 6.2)])
        .await;
    assert_eq!(second.summary.skipped, 1);
    assert!(second.records.is_empty());

    let first = first.await.unwrap();
    assert_eq!(first.summary.succeeded, 1);
}

#[tokio::test]
async fn manual_trigger_bypasses_evaluator_but_not_retries() {
    let rules = Arc::new(MemoryRuleStore::default());
    let log = Arc::new(MemoryExecutionLog::default());

    let executor = ScriptedExecutor::new(
        "notify_team",
        vec![Scripted::Fail, Scripted::Succeed],
    )
    .with_max_retries(3);
    let scheduler = scheduler_with(vec![executor], rules, log.clone(), 1, fast_retry());

    let mut config = serde_json::Map::new();
    config.insert("channel".to_string(), serde_json::json!("#perf-alerts"));

    let record = scheduler
        .trigger_action("ppc", "notify_team", config, Some("cmp-7".to_string()))
        .await
        .unwrap();

    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(record.attempts, 2);
    assert_eq!(record.rule_id, None);
    assert_eq!(record.campaign_id.as_deref(), Some("cmp-7"));
    assert_eq!(log.records().len(), 1);

    let missing = scheduler
        .trigger_action("ppc", "unknown_action", serde_json::Map::new(), None)
        .await;
    assert!(missing.is_err());
}
