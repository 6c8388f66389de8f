//! SQLite implementation of the `ExecutionLog` port.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActionPriority, ExecutionRecord, ExecutionResult, ExecutionStatus, StatsBucket, StatsReport,
    WeightKey,
};
use crate::domain::ports::ExecutionLog;

#[derive(Clone)]
pub struct SqliteExecutionLog {
    pool: SqlitePool,
}

impl SqliteExecutionLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ExecutionRow {
    id: String,
    rule_id: Option<String>,
    rule_name: Option<String>,
    action_type: String,
    agent_type: String,
    metric_type: Option<String>,
    metric_subtype: Option<String>,
    category: Option<String>,
    campaign_id: Option<String>,
    trigger_value: Option<f64>,
    threshold: Option<f64>,
    priority: String,
    status: String,
    attempts: i64,
    success: i32,
    message: String,
    data: Option<String>,
    rollback_data: Option<String>,
    impact_metrics: Option<String>,
    error: Option<String>,
    started_at: String,
    finished_at: String,
}

fn row_to_record(row: ExecutionRow) -> DomainResult<ExecutionRecord> {
    let priority = ActionPriority::parse(&row.priority).ok_or_else(|| {
        DomainError::SerializationError(format!("Unknown priority: {}", row.priority))
    })?;
    let status = ExecutionStatus::parse(&row.status).ok_or_else(|| {
        DomainError::SerializationError(format!("Unknown status: {}", row.status))
    })?;

    let data = row.data.as_deref().map(serde_json::from_str).transpose()?;
    let rollback_data = row
        .rollback_data
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;
    let impact_metrics: Option<HashMap<String, f64>> = row
        .impact_metrics
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;

    Ok(ExecutionRecord {
        id: parse_uuid(&row.id)?,
        rule_id: parse_optional_uuid(row.rule_id)?,
        rule_name: row.rule_name,
        action_type: row.action_type,
        agent_type: row.agent_type,
        metric_type: row.metric_type,
        metric_subtype: row.metric_subtype,
        category: row.category,
        campaign_id: row.campaign_id,
        trigger_value: row.trigger_value,
        threshold: row.threshold,
        priority,
        status,
        attempts: row.attempts.max(0) as u32,
        result: ExecutionResult {
            success: row.success != 0,
            message: row.message,
            data,
            rollback_data,
            impact_metrics,
            error: row.error,
        },
        started_at: parse_datetime(&row.started_at)?,
        finished_at: parse_datetime(&row.finished_at)?,
    })
}

fn window_cutoff(window: Duration) -> String {
    let delta = chrono::Duration::from_std(window)
        .unwrap_or_else(|_| chrono::Duration::days(36_500));
    (Utc::now() - delta).to_rfc3339()
}

#[async_trait]
impl ExecutionLog for SqliteExecutionLog {
    async fn append(&self, record: &ExecutionRecord) -> DomainResult<()> {
        let data = record
            .result
            .data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let rollback_data = record
            .result
            .rollback_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let impact_metrics = record
            .result
            .impact_metrics
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r"INSERT INTO execution_log
               (id, rule_id, rule_name, action_type, agent_type, metric_type,
                metric_subtype, category, campaign_id, trigger_value, threshold,
                priority, status, attempts, success, message, data, rollback_data,
                impact_metrics, error, started_at, finished_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.rule_id.map(|id| id.to_string()))
        .bind(&record.rule_name)
        .bind(&record.action_type)
        .bind(&record.agent_type)
        .bind(&record.metric_type)
        .bind(&record.metric_subtype)
        .bind(&record.category)
        .bind(&record.campaign_id)
        .bind(record.trigger_value)
        .bind(record.threshold)
        .bind(record.priority.as_str())
        .bind(record.status.as_str())
        .bind(i64::from(record.attempts))
        .bind(i32::from(record.result.success))
        .bind(&record.result.message)
        .bind(data)
        .bind(rollback_data)
        .bind(impact_metrics)
        .bind(&record.result.error)
        .bind(record.started_at.to_rfc3339())
        .bind(record.finished_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<ExecutionRecord>> {
        let row: Option<ExecutionRow> = sqlx::query_as("SELECT * FROM execution_log WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_record).transpose()
    }

    async fn recent(
        &self,
        window: Duration,
        agent_type: Option<&str>,
        metric_type: Option<&str>,
    ) -> DomainResult<Vec<ExecutionRecord>> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(
            r"SELECT * FROM execution_log
               WHERE started_at >= ?
                 AND status IN ('completed', 'failed')
                 AND (? IS NULL OR agent_type = ?)
                 AND (? IS NULL OR metric_type = ?)
               ORDER BY started_at DESC",
        )
        .bind(window_cutoff(window))
        .bind(agent_type)
        .bind(agent_type)
        .bind(metric_type)
        .bind(metric_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn success_rate(&self, key: &WeightKey, window: Duration) -> DomainResult<Option<f64>> {
        let row: (i64, f64) = sqlx::query_as(
            r"SELECT COUNT(*),
                     COALESCE(AVG(CASE WHEN success = 1 THEN 1.0 ELSE 0.0 END), 0.0)
               FROM execution_log
               WHERE agent_type = ?
                 AND COALESCE(metric_type, 'general') = ?
                 AND metric_subtype IS ?
                 AND category IS ?
                 AND campaign_id IS ?
                 AND status IN ('completed', 'failed')
                 AND started_at >= ?",
        )
        .bind(&key.agent_type)
        .bind(&key.metric_type)
        .bind(&key.metric_subtype)
        .bind(&key.category)
        .bind(&key.scope)
        .bind(window_cutoff(window))
        .fetch_one(&self.pool)
        .await?;

        if row.0 == 0 {
            Ok(None)
        } else {
            Ok(Some(row.1))
        }
    }

    async fn recent_trigger_values(
        &self,
        key: &WeightKey,
        window: Duration,
        limit: u32,
    ) -> DomainResult<Vec<f64>> {
        let rows: Vec<(f64,)> = sqlx::query_as(
            r"SELECT trigger_value FROM execution_log
               WHERE agent_type = ?
                 AND COALESCE(metric_type, 'general') = ?
                 AND metric_subtype IS ?
                 AND category IS ?
                 AND campaign_id IS ?
                 AND trigger_value IS NOT NULL
                 AND started_at >= ?
               ORDER BY started_at DESC
               LIMIT ?",
        )
        .bind(&key.agent_type)
        .bind(&key.metric_type)
        .bind(&key.metric_subtype)
        .bind(&key.category)
        .bind(&key.scope)
        .bind(window_cutoff(window))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(v,)| v).collect())
    }

    async fn stats(&self, window: Duration) -> DomainResult<StatsReport> {
        let cutoff = window_cutoff(window);

        let totals: (i64, i64, i64) = sqlx::query_as(
            r"SELECT COUNT(*),
                     COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
                     COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0)
               FROM execution_log WHERE started_at >= ?",
        )
        .bind(&cutoff)
        .fetch_one(&self.pool)
        .await?;

        let bucket_query = |column: &str| {
            format!(
                r"SELECT {column} AS key,
                         COUNT(*) AS total,
                         COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS succeeded,
                         COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed
                   FROM execution_log WHERE started_at >= ?
                   GROUP BY {column} ORDER BY total DESC"
            )
        };

        let by_action: Vec<(String, i64, i64, i64)> = sqlx::query_as(&bucket_query("action_type"))
            .bind(&cutoff)
            .fetch_all(&self.pool)
            .await?;
        let by_agent: Vec<(String, i64, i64, i64)> = sqlx::query_as(&bucket_query("agent_type"))
            .bind(&cutoff)
            .fetch_all(&self.pool)
            .await?;

        let to_buckets = |rows: Vec<(String, i64, i64, i64)>| {
            rows.into_iter()
                .map(|(key, total, succeeded, failed)| StatsBucket {
                    key,
                    total: total.max(0) as u64,
                    succeeded: succeeded.max(0) as u64,
                    failed: failed.max(0) as u64,
                })
                .collect()
        };

        Ok(StatsReport {
            window_hours: window.as_secs() / 3600,
            total: totals.0.max(0) as u64,
            succeeded: totals.1.max(0) as u64,
            failed: totals.2.max(0) as u64,
            by_action_type: to_buckets(by_action),
            by_agent_type: to_buckets(by_agent),
        })
    }

    async fn prune_older_than(&self, retention: Duration) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM execution_log WHERE started_at < ?")
            .bind(window_cutoff(retention))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
