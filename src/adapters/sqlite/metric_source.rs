//! SQLite implementation of the `MetricSource` port.
//!
//! The wider platform ingests observations into `metric_observations`; the
//! control loop only reads them. `insert` exists for operator tooling and
//! tests, outside the port contract.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::adapters::sqlite::{parse_datetime, parse_uuid};
use crate::domain::errors::DomainResult;
use crate::domain::models::{MetricObservation, MetricQuery};
use crate::domain::ports::MetricSource;

#[derive(Clone)]
pub struct SqliteMetricSource {
    pool: SqlitePool,
}

impl SqliteMetricSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, obs: &MetricObservation) -> DomainResult<()> {
        sqlx::query(
            r"INSERT INTO metric_observations
               (id, agent_type, metric_type, metric_subtype, category, campaign_id,
                region, platform, value, recorded_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(obs.id.to_string())
        .bind(&obs.agent_type)
        .bind(&obs.metric_type)
        .bind(&obs.metric_subtype)
        .bind(&obs.category)
        .bind(&obs.campaign_id)
        .bind(&obs.region)
        .bind(&obs.platform)
        .bind(obs.value)
        .bind(obs.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MetricRow {
    id: String,
    agent_type: String,
    metric_type: String,
    metric_subtype: Option<String>,
    category: Option<String>,
    campaign_id: Option<String>,
    region: Option<String>,
    platform: Option<String>,
    value: f64,
    recorded_at: String,
}

fn row_to_observation(row: MetricRow) -> DomainResult<MetricObservation> {
    Ok(MetricObservation {
        id: parse_uuid(&row.id)?,
        agent_type: row.agent_type,
        metric_type: row.metric_type,
        metric_subtype: row.metric_subtype,
        category: row.category,
        campaign_id: row.campaign_id,
        region: row.region,
        platform: row.platform,
        value: row.value,
        recorded_at: parse_datetime(&row.recorded_at)?,
    })
}

#[async_trait]
impl MetricSource for SqliteMetricSource {
    async fn query(&self, query: &MetricQuery) -> DomainResult<Vec<MetricObservation>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM metric_observations WHERE 1 = 1");

        if let Some(ref agent) = query.agent_type {
            qb.push(" AND agent_type = ").push_bind(agent.clone());
        }
        if let Some(ref mt) = query.metric_type {
            qb.push(" AND metric_type = ").push_bind(mt.clone());
        }
        if let Some(ref sub) = query.metric_subtype {
            qb.push(" AND metric_subtype = ").push_bind(sub.clone());
        }
        if let Some(ref cat) = query.category {
            qb.push(" AND category = ").push_bind(cat.clone());
        }
        push_allow_list(&mut qb, "campaign_id", &query.campaigns);
        push_allow_list(&mut qb, "region", &query.regions);
        push_allow_list(&mut qb, "platform", &query.platforms);

        if let Some(lookback) = query.lookback {
            let cutoff = Utc::now()
                - chrono::Duration::from_std(lookback)
                    .unwrap_or_else(|_| chrono::Duration::days(36_500));
            qb.push(" AND recorded_at >= ").push_bind(cutoff.to_rfc3339());
        }

        qb.push(" ORDER BY recorded_at DESC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows: Vec<MetricRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_observation).collect()
    }
}

fn push_allow_list(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, allowed: &[String]) {
    if allowed.is_empty() {
        return;
    }
    qb.push(format!(" AND {column} IN ("));
    let mut separated = qb.separated(", ");
    for value in allowed {
        separated.push_bind(value.clone());
    }
    qb.push(")");
}
