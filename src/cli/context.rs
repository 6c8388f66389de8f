//! Shared CLI wiring: database, stores, registry, and services.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::adapters::executors::default_executors;
use crate::adapters::sqlite::{
    initialize_database, SqliteExecutionLog, SqliteMetricSource, SqliteRuleStore,
    SqliteWeightStore,
};
use crate::domain::models::Config;
use crate::domain::ports::{ExecutionLog, RuleStore, WeightStore};
use crate::infrastructure::ConfigLoader;
use crate::services::{
    ActionRegistry, AlertNotifier, ExecutionScheduler, ExecutionStats, FeedbackLearner,
};

/// Everything a command needs, built once per invocation.
pub struct AppContext {
    pub config: Config,
    pub rule_store: Arc<dyn RuleStore>,
    pub metric_source: Arc<SqliteMetricSource>,
    pub weight_store: Arc<dyn WeightStore>,
    pub execution_log: Arc<dyn ExecutionLog>,
    pub registry: Arc<ActionRegistry>,
    pub scheduler: Arc<ExecutionScheduler>,
    pub learner: Arc<FeedbackLearner>,
    pub stats: ExecutionStats,
}

impl AppContext {
    pub async fn init() -> Result<Self> {
        let config = ConfigLoader::load()?;
        Self::with_config(config).await
    }

    pub async fn with_config(config: Config) -> Result<Self> {
        let database_url = format!("sqlite:{}", config.database.path);
        let pool = initialize_database(&database_url)
            .await
            .context("Failed to initialize database")?;

        let rule_store: Arc<dyn RuleStore> = Arc::new(SqliteRuleStore::new(pool.clone()));
        let metric_source = Arc::new(SqliteMetricSource::new(pool.clone()));
        let weight_store: Arc<dyn WeightStore> = Arc::new(SqliteWeightStore::new(pool.clone()));
        let execution_log: Arc<dyn ExecutionLog> = Arc::new(SqliteExecutionLog::new(pool));

        let mut registry = ActionRegistry::new();
        for executor in default_executors() {
            registry
                .register(Arc::new(executor))
                .context("Failed to register built-in executor")?;
        }
        let registry = Arc::new(registry);

        let mut scheduler = ExecutionScheduler::new(
            registry.clone(),
            rule_store.clone(),
            execution_log.clone(),
            &config.scheduler,
            config.retry.clone(),
        );
        if let Some(alerts) = AlertNotifier::from_config(&config.alerts) {
            scheduler = scheduler.with_alerts(Arc::new(alerts));
        }
        let scheduler = Arc::new(scheduler);

        let learner = Arc::new(FeedbackLearner::new(
            execution_log.clone(),
            weight_store.clone(),
            config.learning.clone(),
        ));
        let stats = ExecutionStats::new(execution_log.clone());

        Ok(Self {
            config,
            rule_store,
            metric_source,
            weight_store,
            execution_log,
            registry,
            scheduler,
            learner,
            stats,
        })
    }
}
