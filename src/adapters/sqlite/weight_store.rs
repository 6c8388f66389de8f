//! SQLite implementation of the `WeightStore` port.
//!
//! Weights are append-only: `put_version` deactivates the predecessor and
//! inserts the new active row inside one transaction, so readers always see
//! exactly one active version per key.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::adapters::sqlite::{parse_datetime, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    InsightKind, InsightPriority, LearningInsight, MetricWeight, WeightKey,
};
use crate::domain::ports::WeightStore;

#[derive(Clone)]
pub struct SqliteWeightStore {
    pool: SqlitePool,
}

impl SqliteWeightStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WeightRow {
    id: String,
    agent_type: String,
    metric_type: String,
    metric_subtype: Option<String>,
    category: Option<String>,
    scope: Option<String>,
    weight: f64,
    threshold: Option<f64>,
    confidence: f64,
    sample_size: i64,
    stability: f64,
    version: i64,
    previous_version: Option<String>,
    active: i32,
    created_at: String,
}

fn row_to_weight(row: WeightRow) -> DomainResult<MetricWeight> {
    Ok(MetricWeight {
        id: parse_uuid(&row.id)?,
        key: WeightKey {
            agent_type: row.agent_type,
            metric_type: row.metric_type,
            metric_subtype: row.metric_subtype,
            category: row.category,
            scope: row.scope,
        },
        weight: row.weight,
        threshold: row.threshold,
        confidence: row.confidence,
        sample_size: row.sample_size.max(0) as u64,
        stability: row.stability,
        version: row.version.max(0) as u32,
        previous_version: parse_optional_uuid(row.previous_version)?,
        active: row.active != 0,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[derive(Debug, sqlx::FromRow)]
struct InsightRow {
    id: String,
    kind: String,
    priority: String,
    agent_type: String,
    metric_type: String,
    metric_subtype: Option<String>,
    category: Option<String>,
    scope: Option<String>,
    title: String,
    detail: String,
    confidence: f64,
    expected_impact: f64,
    evidence_count: i64,
    created_at: String,
}

fn row_to_insight(row: InsightRow) -> DomainResult<LearningInsight> {
    let kind = InsightKind::parse(&row.kind).ok_or_else(|| {
        DomainError::SerializationError(format!("Unknown insight kind: {}", row.kind))
    })?;
    let priority = InsightPriority::parse(&row.priority).ok_or_else(|| {
        DomainError::SerializationError(format!("Unknown insight priority: {}", row.priority))
    })?;

    Ok(LearningInsight {
        id: parse_uuid(&row.id)?,
        kind,
        priority,
        key: WeightKey {
            agent_type: row.agent_type,
            metric_type: row.metric_type,
            metric_subtype: row.metric_subtype,
            category: row.category,
            scope: row.scope,
        },
        title: row.title,
        detail: row.detail,
        confidence: row.confidence,
        expected_impact: row.expected_impact,
        evidence_count: row.evidence_count.max(0) as u64,
        created_at: parse_datetime(&row.created_at)?,
    })
}

const KEY_MATCH: &str = r"agent_type = ?
                 AND metric_type = ?
                 AND metric_subtype IS ?
                 AND category IS ?
                 AND scope IS ?";

#[async_trait]
impl WeightStore for SqliteWeightStore {
    async fn active(&self, key: &WeightKey) -> DomainResult<Option<MetricWeight>> {
        let sql = format!("SELECT * FROM metric_weights WHERE active = 1 AND {KEY_MATCH}");
        let row: Option<WeightRow> = sqlx::query_as(&sql)
            .bind(&key.agent_type)
            .bind(&key.metric_type)
            .bind(&key.metric_subtype)
            .bind(&key.category)
            .bind(&key.scope)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_weight).transpose()
    }

    async fn put_version(&self, weight: &MetricWeight) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        let deactivate = format!(
            "UPDATE metric_weights SET active = 0 WHERE active = 1 AND {KEY_MATCH}"
        );
        sqlx::query(&deactivate)
            .bind(&weight.key.agent_type)
            .bind(&weight.key.metric_type)
            .bind(&weight.key.metric_subtype)
            .bind(&weight.key.category)
            .bind(&weight.key.scope)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r"INSERT INTO metric_weights
               (id, agent_type, metric_type, metric_subtype, category, scope,
                weight, threshold, confidence, sample_size, stability, version,
                previous_version, active, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(weight.id.to_string())
        .bind(&weight.key.agent_type)
        .bind(&weight.key.metric_type)
        .bind(&weight.key.metric_subtype)
        .bind(&weight.key.category)
        .bind(&weight.key.scope)
        .bind(weight.weight)
        .bind(weight.threshold)
        .bind(weight.confidence)
        .bind(weight.sample_size as i64)
        .bind(weight.stability)
        .bind(i64::from(weight.version))
        .bind(weight.previous_version.map(|id| id.to_string()))
        .bind(weight.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn history(&self, key: &WeightKey) -> DomainResult<Vec<MetricWeight>> {
        let sql = format!(
            "SELECT * FROM metric_weights WHERE {KEY_MATCH} ORDER BY version DESC"
        );
        let rows: Vec<WeightRow> = sqlx::query_as(&sql)
            .bind(&key.agent_type)
            .bind(&key.metric_type)
            .bind(&key.metric_subtype)
            .bind(&key.category)
            .bind(&key.scope)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_weight).collect()
    }

    async fn list_active(&self) -> DomainResult<Vec<MetricWeight>> {
        let rows: Vec<WeightRow> = sqlx::query_as(
            "SELECT * FROM metric_weights WHERE active = 1 ORDER BY agent_type, metric_type",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_weight).collect()
    }

    async fn record_insight(&self, insight: &LearningInsight) -> DomainResult<()> {
        sqlx::query(
            r"INSERT INTO learning_insights
               (id, kind, priority, agent_type, metric_type, metric_subtype,
                category, scope, title, detail, confidence, expected_impact,
                evidence_count, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(insight.id.to_string())
        .bind(insight.kind.as_str())
        .bind(insight.priority.as_str())
        .bind(&insight.key.agent_type)
        .bind(&insight.key.metric_type)
        .bind(&insight.key.metric_subtype)
        .bind(&insight.key.category)
        .bind(&insight.key.scope)
        .bind(&insight.title)
        .bind(&insight.detail)
        .bind(insight.confidence)
        .bind(insight.expected_impact)
        .bind(insight.evidence_count as i64)
        .bind(insight.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_insights(&self, limit: u32) -> DomainResult<Vec<LearningInsight>> {
        let rows: Vec<InsightRow> = sqlx::query_as(
            "SELECT * FROM learning_insights ORDER BY created_at DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_insight).collect()
    }
}
