//! Alert channel integration: failed passes hit the webhook, and delivery
//! problems never propagate.

mod common;

use std::sync::Arc;

use adwatch::domain::models::{ActionPriority, RetryConfig, SchedulerConfig};
use adwatch::domain::ports::RuleStore;
use adwatch::services::{ActionRegistry, AlertNotifier, ExecutionScheduler};

use common::{make_rule, make_trigger, MemoryExecutionLog, MemoryRuleStore, Scripted, ScriptedExecutor};

fn retry_once() -> RetryConfig {
    RetryConfig {
        base_delay_ms: 1,
        backoff_multiplier: 2.0,
        max_delay_ms: 10,
    }
}

#[tokio::test]
async fn failed_pass_notifies_webhook() {
    let mut server = mockito::Server::new_async().await;
    let hook = server
        .mock("POST", "/hook")
        .match_header("content-type", "application/json")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let rules = Arc::new(MemoryRuleStore::default());
    let log = Arc::new(MemoryExecutionLog::default());
    let rule = make_rule("always-fails", 5.0, "pause_campaign");
    rules.create(&rule).await.unwrap();

    let executor = ScriptedExecutor::new(
        "pause_campaign",
        vec![Scripted::Fail, Scripted::Fail],
    )
    .with_max_retries(1);

    let mut registry = ActionRegistry::new();
    registry.register(Arc::new(executor)).unwrap();

    let config = SchedulerConfig::default();
    let scheduler = ExecutionScheduler::new(
        Arc::new(registry),
        rules,
        log,
        &config,
        retry_once(),
    )
    .with_alerts(Arc::new(AlertNotifier::with_url(
        format!("{}/hook", server.url()),
        6,
    )));

    let outcome = scheduler
        .run(vec![make_trigger(&rule, ActionPriority::High, 6.2)])
        .await;
    assert_eq!(outcome.summary.failed, 1);

    hook.assert_async().await;
}

#[tokio::test]
async fn successful_pass_does_not_notify() {
    let mut server = mockito::Server::new_async().await;
    let hook = server
        .mock("POST", "/hook")
        .expect(0)
        .create_async()
        .await;

    let rules = Arc::new(MemoryRuleStore::default());
    let log = Arc::new(MemoryExecutionLog::default());
    let rule = make_rule("fine-rule", 5.0, "pause_campaign");
    rules.create(&rule).await.unwrap();

    let executor = ScriptedExecutor::new("pause_campaign", vec![Scripted::Succeed]);
    let mut registry = ActionRegistry::new();
    registry.register(Arc::new(executor)).unwrap();

    let config = SchedulerConfig::default();
    let scheduler = ExecutionScheduler::new(
        Arc::new(registry),
        rules,
        log,
        &config,
        retry_once(),
    )
    .with_alerts(Arc::new(AlertNotifier::with_url(
        format!("{}/hook", server.url()),
        6,
    )));

    let outcome = scheduler
        .run(vec![make_trigger(&rule, ActionPriority::High, 6.2)])
        .await;
    assert_eq!(outcome.summary.succeeded, 1);

    hook.assert_async().await;
}

#[tokio::test]
async fn rejected_delivery_is_swallowed() {
    let mut server = mockito::Server::new_async().await;
    let _hook = server
        .mock("POST", "/hook")
        .with_status(500)
        .create_async()
        .await;

    let notifier = AlertNotifier::with_url(format!("{}/hook", server.url()), 6);
    let summary = adwatch::domain::models::RunSummary {
        triggered: 1,
        failed: 1,
        ..Default::default()
    };
    // Must not panic or return an error surface.
    notifier.notify_failures(&summary).await;
}
