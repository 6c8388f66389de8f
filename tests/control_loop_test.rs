//! End-to-end pass over the SQLite adapters: rule + observation in the
//! database, one `run_once`, and the full fire → execute → learn trail.

mod common;

use std::sync::Arc;
use std::time::Duration;

use adwatch::adapters::sqlite::{
    create_migrated_test_pool, SqliteExecutionLog, SqliteMetricSource, SqliteRuleStore,
    SqliteWeightStore,
};
use adwatch::application::ControlLoop;
use adwatch::domain::models::{LearningConfig, RetryConfig, SchedulerConfig, WeightKey};
use adwatch::domain::ports::{ExecutionLog, MetricSource, RuleStore, WeightStore};
use adwatch::services::{
    ActionRegistry, ExecutionScheduler, FeedbackLearner, TriggerEvaluator,
};

use common::{make_observation, make_rule, Scripted, ScriptedExecutor};

struct Harness {
    control_loop: ControlLoop,
    rule_store: Arc<SqliteRuleStore>,
    metric_source: Arc<SqliteMetricSource>,
    execution_log: Arc<SqliteExecutionLog>,
    weight_store: Arc<SqliteWeightStore>,
}

async fn harness(executors: Vec<ScriptedExecutor>) -> Harness {
    let pool = create_migrated_test_pool().await.unwrap();
    let rule_store = Arc::new(SqliteRuleStore::new(pool.clone()));
    let metric_source = Arc::new(SqliteMetricSource::new(pool.clone()));
    let execution_log = Arc::new(SqliteExecutionLog::new(pool.clone()));
    let weight_store = Arc::new(SqliteWeightStore::new(pool));

    let mut registry = ActionRegistry::new();
    for executor in executors {
        registry.register(Arc::new(executor)).unwrap();
    }

    let scheduler_config = SchedulerConfig {
        max_concurrent_actions: 2,
        ..SchedulerConfig::default()
    };
    let retry = RetryConfig {
        base_delay_ms: 1,
        backoff_multiplier: 2.0,
        max_delay_ms: 10,
    };

    let scheduler = Arc::new(ExecutionScheduler::new(
        Arc::new(registry),
        rule_store.clone() as Arc<dyn RuleStore>,
        execution_log.clone() as Arc<dyn ExecutionLog>,
        &scheduler_config,
        retry,
    ));
    let learner = Arc::new(FeedbackLearner::new(
        execution_log.clone() as Arc<dyn ExecutionLog>,
        weight_store.clone() as Arc<dyn WeightStore>,
        LearningConfig::default(),
    ));

    let control_loop = ControlLoop::new(
        TriggerEvaluator::new(),
        scheduler,
        learner,
        rule_store.clone() as Arc<dyn RuleStore>,
        metric_source.clone() as Arc<dyn MetricSource>,
        execution_log.clone() as Arc<dyn ExecutionLog>,
        &scheduler_config,
    );

    Harness {
        control_loop,
        rule_store,
        metric_source,
        execution_log,
        weight_store,
    }
}

#[tokio::test]
async fn single_violation_fires_executes_and_learns() {
    let executor = ScriptedExecutor::new("pause_campaign", vec![Scripted::Succeed]);
    let h = harness(vec![executor]).await;

    let mut rule = make_rule("cpc-spike", 5.0, "pause_campaign");
    rule.cooldown = Some(Duration::from_secs(3600));
    h.rule_store.create(&rule).await.unwrap();
    h.metric_source
        .insert(&make_observation(6.2))
        .await
        .unwrap();

    let summary = h.control_loop.run_once().await.unwrap();
    assert_eq!(summary.triggered, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);

    // Bookkeeping: last_fired set, fire_count incremented exactly once.
    let stored = h.rule_store.get(rule.id).await.unwrap().unwrap();
    assert_eq!(stored.fire_count, 1);
    assert!(stored.last_fired.is_some());

    // The execution trail is durable and the learner versioned a weight.
    let recent = h
        .execution_log
        .recent(Duration::from_secs(3600), None, None)
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].rule_id, Some(rule.id));

    // Learning keys include the campaign scope carried by the observation.
    let mut key = WeightKey::new("ppc", "cost_per_click");
    key.scope = Some("cmp-1".to_string());
    let weight = h.weight_store.active(&key).await.unwrap();
    assert!(weight.is_some());
}

#[tokio::test]
async fn cooldown_suppresses_second_pass() {
    let executor = ScriptedExecutor::new("pause_campaign", vec![Scripted::Succeed]);
    let h = harness(vec![executor]).await;

    let mut rule = make_rule("cooldown-rule", 5.0, "pause_campaign");
    rule.cooldown = Some(Duration::from_secs(3600));
    h.rule_store.create(&rule).await.unwrap();
    h.metric_source
        .insert(&make_observation(7.5))
        .await
        .unwrap();

    let first = h.control_loop.run_once().await.unwrap();
    assert_eq!(first.triggered, 1);

    // Same observations, but the rule is now inside its cooldown window.
    let second = h.control_loop.run_once().await.unwrap();
    assert_eq!(second.triggered, 0);

    let stored = h.rule_store.get(rule.id).await.unwrap().unwrap();
    assert_eq!(stored.fire_count, 1);
}

#[tokio::test]
async fn pass_with_no_matching_metrics_is_quiet() {
    let executor = ScriptedExecutor::new("pause_campaign", vec![Scripted::Succeed]);
    let h = harness(vec![executor]).await;

    let rule = make_rule("quiet-rule", 5.0, "pause_campaign");
    h.rule_store.create(&rule).await.unwrap();
    // Below threshold: nothing should fire.
    h.metric_source
        .insert(&make_observation(3.0))
        .await
        .unwrap();

    let summary = h.control_loop.run_once().await.unwrap();
    assert_eq!(summary.triggered, 0);
    assert_eq!(summary.succeeded, 0);

    let stored = h.rule_store.get(rule.id).await.unwrap().unwrap();
    assert_eq!(stored.fire_count, 0);
    assert!(stored.last_fired.is_none());
}

#[tokio::test]
async fn failing_action_is_reported_not_fatal() {
    let executor = ScriptedExecutor::new(
        "pause_campaign",
        vec![Scripted::Fail, Scripted::Fail, Scripted::Fail, Scripted::Fail],
    )
    .with_max_retries(2);
    let ok_executor = ScriptedExecutor::new("notify_team", vec![Scripted::Succeed]);
    let h = harness(vec![executor, ok_executor]).await;

    let failing = make_rule("failing-rule", 5.0, "pause_campaign");
    let notifying = make_rule("notify-rule", 5.0, "notify_team");
    h.rule_store.create(&failing).await.unwrap();
    h.rule_store.create(&notifying).await.unwrap();
    h.metric_source
        .insert(&make_observation(9.9))
        .await
        .unwrap();

    let summary = h.control_loop.run_once().await.unwrap();
    assert_eq!(summary.triggered, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].action_type, "pause_campaign");
}

#[tokio::test]
async fn loop_start_stop_lifecycle_is_clean() {
    let executor = ScriptedExecutor::new("pause_campaign", vec![]);
    let h = harness(vec![executor]).await;

    h.control_loop.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.control_loop.stop().await.unwrap();

    let stats = h.control_loop.stats().await;
    assert_eq!(stats.state, adwatch::application::LoopState::Stopped);
    // The immediate first tick ran at least one (empty) pass.
    assert!(stats.passes_completed >= 1);
}
