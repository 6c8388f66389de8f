//! SQLite implementation of the `RuleStore` port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::time::Duration;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActionPriority, ConditionKind, Rule, RuleScope, TriggerCondition};
use crate::domain::ports::RuleStore;

#[derive(Clone)]
pub struct SqliteRuleStore {
    pool: SqlitePool,
}

impl SqliteRuleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    id: String,
    name: String,
    description: String,
    enabled: i32,
    scope_json: String,
    condition_kind: String,
    threshold: Option<f64>,
    window_secs: Option<i64>,
    consecutive_count: i64,
    action_type: String,
    action_params: String,
    priority: String,
    cooldown_secs: Option<i64>,
    last_fired: Option<String>,
    fire_count: i64,
    created_at: String,
    updated_at: String,
}

fn row_to_rule(row: RuleRow) -> DomainResult<Rule> {
    let id = parse_uuid(&row.id)?;
    let scope: RuleScope = serde_json::from_str(&row.scope_json)?;
    let kind = ConditionKind::parse(&row.condition_kind).ok_or_else(|| {
        DomainError::SerializationError(format!("Unknown condition kind: {}", row.condition_kind))
    })?;
    let priority = ActionPriority::parse(&row.priority).ok_or_else(|| {
        DomainError::SerializationError(format!("Unknown priority: {}", row.priority))
    })?;
    let action_params: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&row.action_params)?;

    Ok(Rule {
        id,
        name: row.name,
        description: row.description,
        enabled: row.enabled != 0,
        scope,
        condition: TriggerCondition {
            kind,
            threshold: row.threshold,
            window: row.window_secs.map(|s| Duration::from_secs(s.max(0) as u64)),
            consecutive_count: row.consecutive_count.max(1) as u32,
        },
        action_type: row.action_type,
        action_params,
        priority,
        cooldown: row
            .cooldown_secs
            .map(|s| Duration::from_secs(s.max(0) as u64)),
        last_fired: parse_optional_datetime(row.last_fired)?,
        fire_count: row.fire_count.max(0) as u64,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

#[async_trait]
impl RuleStore for SqliteRuleStore {
    async fn create(&self, rule: &Rule) -> DomainResult<()> {
        let scope_json = serde_json::to_string(&rule.scope)?;
        let action_params = serde_json::to_string(&rule.action_params)?;

        sqlx::query(
            r"INSERT INTO rules
               (id, name, description, enabled, scope_json, condition_kind, threshold,
                window_secs, consecutive_count, action_type, action_params, priority,
                cooldown_secs, last_fired, fire_count, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(rule.id.to_string())
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(i32::from(rule.enabled))
        .bind(&scope_json)
        .bind(rule.condition.kind.as_str())
        .bind(rule.condition.threshold)
        .bind(rule.condition.window.map(|w| w.as_secs() as i64))
        .bind(i64::from(rule.condition.consecutive_count))
        .bind(&rule.action_type)
        .bind(&action_params)
        .bind(rule.priority.as_str())
        .bind(rule.cooldown.map(|c| c.as_secs() as i64))
        .bind(rule.last_fired.map(|t| t.to_rfc3339()))
        .bind(rule.fire_count as i64)
        .bind(rule.created_at.to_rfc3339())
        .bind(rule.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Rule>> {
        let row: Option<RuleRow> = sqlx::query_as("SELECT * FROM rules WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_rule).transpose()
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Rule>> {
        let row: Option<RuleRow> = sqlx::query_as("SELECT * FROM rules WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_rule).transpose()
    }

    async fn update(&self, rule: &Rule) -> DomainResult<()> {
        let scope_json = serde_json::to_string(&rule.scope)?;
        let action_params = serde_json::to_string(&rule.action_params)?;

        sqlx::query(
            r"UPDATE rules SET
               name = ?, description = ?, enabled = ?, scope_json = ?,
               condition_kind = ?, threshold = ?, window_secs = ?, consecutive_count = ?,
               action_type = ?, action_params = ?, priority = ?, cooldown_secs = ?,
               last_fired = ?, fire_count = ?, updated_at = ?
               WHERE id = ?",
        )
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(i32::from(rule.enabled))
        .bind(&scope_json)
        .bind(rule.condition.kind.as_str())
        .bind(rule.condition.threshold)
        .bind(rule.condition.window.map(|w| w.as_secs() as i64))
        .bind(i64::from(rule.condition.consecutive_count))
        .bind(&rule.action_type)
        .bind(&action_params)
        .bind(rule.priority.as_str())
        .bind(rule.cooldown.map(|c| c.as_secs() as i64))
        .bind(rule.last_fired.map(|t| t.to_rfc3339()))
        .bind(rule.fire_count as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(rule.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM rules WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Rule>> {
        let rows: Vec<RuleRow> = sqlx::query_as("SELECT * FROM rules ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_rule).collect()
    }

    async fn list_active(&self) -> DomainResult<Vec<Rule>> {
        let rows: Vec<RuleRow> = sqlx::query_as(
            r"SELECT * FROM rules WHERE enabled = 1
               ORDER BY CASE priority
                   WHEN 'emergency' THEN 0
                   WHEN 'critical' THEN 1
                   WHEN 'high' THEN 2
                   WHEN 'medium' THEN 3
                   ELSE 4
               END, updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_rule).collect()
    }

    async fn set_enabled(&self, id: Uuid, enabled: bool) -> DomainResult<bool> {
        let result = sqlx::query("UPDATE rules SET enabled = ?, updated_at = ? WHERE id = ?")
            .bind(i32::from(enabled))
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_fired(&self, id: Uuid, fired_at: DateTime<Utc>) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE rules SET last_fired = ?, fire_count = fire_count + 1 WHERE id = ?",
        )
        .bind(fired_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::RuleNotFound(id));
        }
        Ok(())
    }
}
