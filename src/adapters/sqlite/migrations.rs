//! SQLite database migration management.
//!
//! Migrations are embedded as SQL constants and applied in version order
//! through a `schema_migrations` bookkeeping table.

use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to execute migration {version}: {source}")]
    ExecutionError {
        version: i64,
        #[source]
        source: sqlx::Error,
    },
    #[error("Failed to get schema version: {0}")]
    VersionCheckError(#[source] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    pub sql: String,
}

pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_embedded_migrations(
        &self,
        migrations: Vec<Migration>,
    ) -> Result<usize, MigrationError> {
        self.ensure_migrations_table().await?;
        let current_version = self.get_current_version().await?;
        let pending: Vec<_> = migrations
            .into_iter()
            .filter(|m| m.version > current_version)
            .collect();

        if pending.is_empty() {
            return Ok(0);
        }

        for migration in &pending {
            self.apply_migration(migration).await?;
        }

        Ok(pending.len())
    }

    async fn ensure_migrations_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),
                description TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MigrationError::ExecutionError {
            version: 0,
            source: e,
        })?;
        Ok(())
    }

    pub async fn get_current_version(&self) -> Result<i64, MigrationError> {
        let result: Option<(i64,)> =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_optional(&self.pool)
                .await
                .map_err(MigrationError::VersionCheckError)?;
        Ok(result.map(|(v,)| v).unwrap_or(0))
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<(), MigrationError> {
        sqlx::raw_sql(&migration.sql)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::ExecutionError {
                version: migration.version,
                source: e,
            })?;

        sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::ExecutionError {
                version: migration.version,
                source: e,
            })?;
        Ok(())
    }
}

const INITIAL_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS rules (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    enabled INTEGER NOT NULL DEFAULT 1,
    scope_json TEXT NOT NULL DEFAULT '{}',
    condition_kind TEXT NOT NULL,
    threshold REAL,
    window_secs INTEGER,
    consecutive_count INTEGER NOT NULL DEFAULT 1,
    action_type TEXT NOT NULL,
    action_params TEXT NOT NULL DEFAULT '{}',
    priority TEXT NOT NULL DEFAULT 'medium',
    cooldown_secs INTEGER,
    last_fired TEXT,
    fire_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_rules_enabled ON rules(enabled);

CREATE TABLE IF NOT EXISTS metric_observations (
    id TEXT PRIMARY KEY,
    agent_type TEXT NOT NULL,
    metric_type TEXT NOT NULL,
    metric_subtype TEXT,
    category TEXT,
    campaign_id TEXT,
    region TEXT,
    platform TEXT,
    value REAL NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_metrics_scope_time
    ON metric_observations(agent_type, metric_type, recorded_at);

CREATE TABLE IF NOT EXISTS execution_log (
    id TEXT PRIMARY KEY,
    rule_id TEXT,
    rule_name TEXT,
    action_type TEXT NOT NULL,
    agent_type TEXT NOT NULL,
    metric_type TEXT,
    metric_subtype TEXT,
    category TEXT,
    campaign_id TEXT,
    trigger_value REAL,
    threshold REAL,
    priority TEXT NOT NULL,
    status TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    success INTEGER NOT NULL DEFAULT 0,
    message TEXT NOT NULL DEFAULT '',
    data TEXT,
    rollback_data TEXT,
    impact_metrics TEXT,
    error TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_execution_log_time ON execution_log(started_at);
CREATE INDEX IF NOT EXISTS idx_execution_log_context
    ON execution_log(agent_type, metric_type, started_at);

CREATE TABLE IF NOT EXISTS metric_weights (
    id TEXT PRIMARY KEY,
    agent_type TEXT NOT NULL,
    metric_type TEXT NOT NULL,
    metric_subtype TEXT,
    category TEXT,
    scope TEXT,
    weight REAL NOT NULL,
    threshold REAL,
    confidence REAL NOT NULL,
    sample_size INTEGER NOT NULL DEFAULT 0,
    stability REAL NOT NULL DEFAULT 0.5,
    version INTEGER NOT NULL,
    previous_version TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_weights_key
    ON metric_weights(agent_type, metric_type, active);

CREATE TABLE IF NOT EXISTS learning_insights (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    priority TEXT NOT NULL,
    agent_type TEXT NOT NULL,
    metric_type TEXT NOT NULL,
    metric_subtype TEXT,
    category TEXT,
    scope TEXT,
    title TEXT NOT NULL,
    detail TEXT NOT NULL,
    confidence REAL NOT NULL,
    expected_impact REAL NOT NULL,
    evidence_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_insights_time ON learning_insights(created_at);
";

pub fn initial_schema_migration() -> Migration {
    Migration {
        version: 1,
        description: "Initial schema".to_string(),
        sql: INITIAL_SCHEMA.to_string(),
    }
}

pub fn all_embedded_migrations() -> Vec<Migration> {
    vec![initial_schema_migration()]
}
