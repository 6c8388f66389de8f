//! Metric observations and the query shape used to fetch them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single metric sample. Append-only from the evaluator's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricObservation {
    pub id: Uuid,
    pub agent_type: String,
    pub metric_type: String,
    pub metric_subtype: Option<String>,
    pub category: Option<String>,
    pub campaign_id: Option<String>,
    pub region: Option<String>,
    pub platform: Option<String>,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

impl MetricObservation {
    pub fn new(
        agent_type: impl Into<String>,
        metric_type: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_type: agent_type.into(),
            metric_type: metric_type.into(),
            metric_subtype: None,
            category: None,
            campaign_id: None,
            region: None,
            platform: None,
            value,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_campaign(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }

    pub fn with_recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = at;
        self
    }
}

/// Scope filters + lookback for a `MetricSource` query.
///
/// Results are ordered by `recorded_at` descending. An absent filter or
/// empty allow-list means "match all".
#[derive(Debug, Clone, Default)]
pub struct MetricQuery {
    pub agent_type: Option<String>,
    pub metric_type: Option<String>,
    pub metric_subtype: Option<String>,
    pub category: Option<String>,
    pub campaigns: Vec<String>,
    pub regions: Vec<String>,
    pub platforms: Vec<String>,
    pub lookback: Option<Duration>,
    pub limit: Option<u32>,
}

impl MetricQuery {
    pub fn all_within(lookback: Duration) -> Self {
        Self {
            lookback: Some(lookback),
            ..Self::default()
        }
    }
}
