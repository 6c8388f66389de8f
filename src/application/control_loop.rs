//! The periodic control-loop driver.
//!
//! One evaluation+execution pass at a time: the tick loop calls `run_once`,
//! and the scheduler's own running flag suppresses any overlapping
//! invocation (a concurrent pass is skipped, not queued). Shutdown is a
//! broadcast signal; the in-flight pass is cancelled cooperatively between
//! chunks via the scheduler's cancel flag.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{ExecutionStatus, MetricQuery, RunSummary, SchedulerConfig};
use crate::domain::ports::{ExecutionLog, MetricSource, RuleStore};
use crate::services::{ExecutionScheduler, FeedbackLearner, TriggerEvaluator};

/// Control-loop lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
    Stopping,
}

/// Snapshot of loop progress.
#[derive(Debug, Clone)]
pub struct LoopStats {
    pub state: LoopState,
    pub passes_completed: u64,
    pub last_summary: Option<RunSummary>,
}

/// Everything one pass needs, cloneable into the tick task.
#[derive(Clone)]
struct PassContext {
    evaluator: TriggerEvaluator,
    scheduler: Arc<ExecutionScheduler>,
    learner: Arc<FeedbackLearner>,
    rules: Arc<dyn RuleStore>,
    metrics: Arc<dyn MetricSource>,
    log: Arc<dyn ExecutionLog>,
    metric_lookback: Duration,
    retention: Duration,
}

impl PassContext {
    /// One evaluation → execution → learning pass.
    async fn run_once(&self) -> DomainResult<RunSummary> {
        let now = Utc::now();
        let rules = self.rules.list_active().await?;

        // Fetch enough history for the widest rule window.
        let lookback = rules
            .iter()
            .filter_map(|r| r.condition.window)
            .max()
            .map_or(self.metric_lookback, |w| w.max(self.metric_lookback));
        let metrics = self.metrics.query(&MetricQuery::all_within(lookback)).await?;

        let triggers = self.evaluator.evaluate(&rules, &metrics, now);
        debug!(
            rules = rules.len(),
            observations = metrics.len(),
            triggers = triggers.len(),
            "Evaluation pass complete"
        );

        let outcome = self.scheduler.run(triggers).await;

        for record in &outcome.records {
            if record.status == ExecutionStatus::Skipped {
                continue;
            }
            if let Err(e) = self.learner.process_outcome(record.id).await {
                warn!(
                    record_id = %record.id,
                    error = %e,
                    "Outcome learning failed"
                );
            }
        }

        match self.log.prune_older_than(self.retention).await {
            Ok(0) => {}
            Ok(pruned) => debug!(pruned, "Pruned expired execution records"),
            Err(e) => warn!(error = %e, "Execution-log pruning failed"),
        }

        Ok(outcome.summary)
    }
}

pub struct ControlLoop {
    ctx: PassContext,
    tick_interval: Duration,
    state: Arc<RwLock<LoopState>>,
    passes_completed: Arc<RwLock<u64>>,
    last_summary: Arc<RwLock<Option<RunSummary>>>,
    shutdown_tx: broadcast::Sender<()>,
    handle: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl ControlLoop {
    pub fn new(
        evaluator: TriggerEvaluator,
        scheduler: Arc<ExecutionScheduler>,
        learner: Arc<FeedbackLearner>,
        rules: Arc<dyn RuleStore>,
        metrics: Arc<dyn MetricSource>,
        log: Arc<dyn ExecutionLog>,
        config: &SchedulerConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            ctx: PassContext {
                evaluator,
                scheduler,
                learner,
                rules,
                metrics,
                log,
                metric_lookback: config.metric_lookback(),
                retention: Duration::from_secs(
                    u64::from(config.execution_retention_days) * 24 * 3600,
                ),
            },
            tick_interval: Duration::from_secs(config.tick_interval_secs.max(1)),
            state: Arc::new(RwLock::new(LoopState::Stopped)),
            passes_completed: Arc::new(RwLock::new(0)),
            last_summary: Arc::new(RwLock::new(None)),
            shutdown_tx,
            handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Run a single pass immediately, outside the tick cadence. Used by the
    /// CLI and tests; safe to call while the loop runs, since the scheduler's
    /// running flag turns an overlap into a skipped summary.
    pub async fn run_once(&self) -> DomainResult<RunSummary> {
        let summary = self.ctx.run_once().await?;
        *self.last_summary.write().await = Some(summary.clone());
        *self.passes_completed.write().await += 1;
        Ok(summary)
    }

    /// Start the periodic driver.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != LoopState::Stopped {
            return Ok(());
        }
        *state = LoopState::Running;
        drop(state);

        info!(
            tick_secs = self.tick_interval.as_secs(),
            "Starting control loop"
        );

        let ctx = self.ctx.clone();
        let tick_interval = self.tick_interval;
        let passes_completed = self.passes_completed.clone();
        let last_summary = self.last_summary.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(tick_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match ctx.run_once().await {
                            Ok(summary) => {
                                if summary.failed > 0 {
                                    warn!(
                                        triggered = summary.triggered,
                                        failed = summary.failed,
                                        "Pass finished with failures"
                                    );
                                } else if summary.triggered > 0 {
                                    info!(
                                        triggered = summary.triggered,
                                        succeeded = summary.succeeded,
                                        "Pass finished"
                                    );
                                }
                                *last_summary.write().await = Some(summary);
                                *passes_completed.write().await += 1;
                            }
                            Err(e) => {
                                error!(error = %e, "Evaluation pass failed");
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Control loop received shutdown signal");
                        break;
                    }
                }
            }
        });

        *self.handle.write().await = Some(handle);
        Ok(())
    }

    /// Graceful shutdown: stop ticking, cancel the in-flight pass between
    /// chunks, and wait for the driver task (bounded).
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state == LoopState::Stopped {
            return Ok(());
        }
        *state = LoopState::Stopping;
        drop(state);

        let _ = self.shutdown_tx.send(());
        self.ctx
            .scheduler
            .cancel_handle()
            .store(true, std::sync::atomic::Ordering::SeqCst);

        if let Some(handle) = self.handle.write().await.take() {
            tokio::time::timeout(Duration::from_secs(30), handle)
                .await
                .context("Control loop shutdown timed out")?
                .context("Control loop task panicked")?;
        }

        *self.state.write().await = LoopState::Stopped;
        info!("Control loop stopped");
        Ok(())
    }

    pub async fn stats(&self) -> LoopStats {
        LoopStats {
            state: *self.state.read().await,
            passes_completed: *self.passes_completed.read().await,
            last_summary: self.last_summary.read().await.clone(),
        }
    }
}

impl std::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("tick_interval", &self.tick_interval)
            .finish()
    }
}
