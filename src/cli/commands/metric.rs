//! Metric observation CLI commands (operator tooling).

use anyhow::Result;
use clap::{Args, Subcommand};
use std::time::Duration;

use crate::cli::context::AppContext;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::{MetricObservation, MetricQuery};
use crate::domain::ports::MetricSource;

#[derive(Args, Debug)]
pub struct MetricArgs {
    #[command(subcommand)]
    pub command: MetricCommands,
}

#[derive(Subcommand, Debug)]
pub enum MetricCommands {
    /// Record a metric observation
    Record {
        /// Agent type (e.g. ppc, email, social)
        #[arg(long)]
        agent_type: String,
        /// Metric type (e.g. cost_per_click, roas, spend)
        #[arg(long)]
        metric_type: String,
        /// Observed value
        #[arg(long)]
        value: f64,
        /// Optional metric subtype
        #[arg(long)]
        subtype: Option<String>,
        /// Optional category
        #[arg(long)]
        category: Option<String>,
        /// Optional campaign id
        #[arg(long)]
        campaign: Option<String>,
        /// Optional region tag
        #[arg(long)]
        region: Option<String>,
        /// Optional platform tag
        #[arg(long)]
        platform: Option<String>,
    },
    /// List recent observations
    List {
        /// Lookback in hours
        #[arg(long, default_value_t = 24)]
        hours: u64,
        /// Narrow to one agent type
        #[arg(long)]
        agent_type: Option<String>,
        /// Narrow to one metric type
        #[arg(long)]
        metric_type: Option<String>,
        /// Maximum rows
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct MetricRecordedOutput {
    pub id: String,
    pub agent_type: String,
    pub metric_type: String,
    pub value: f64,
}

impl CommandOutput for MetricRecordedOutput {
    fn to_human(&self) -> String {
        format!(
            "Recorded {}/{} = {} ({})",
            self.agent_type, self.metric_type, self.value, self.id
        )
    }
}

#[derive(Debug, serde::Serialize)]
pub struct MetricListOutput {
    pub observations: Vec<MetricObservation>,
    pub total: usize,
}

impl CommandOutput for MetricListOutput {
    fn to_human(&self) -> String {
        if self.observations.is_empty() {
            return "No observations found.".to_string();
        }

        let mut lines = vec![format!("Found {} observation(s):\n", self.total)];
        lines.push(format!(
            "{:<22} {:<10} {:<18} {:<12} {:<12}",
            "RECORDED", "AGENT", "METRIC", "VALUE", "CAMPAIGN"
        ));
        lines.push("-".repeat(78));
        for obs in &self.observations {
            lines.push(format!(
                "{:<22} {:<10} {:<18} {:<12.4} {:<12}",
                obs.recorded_at.format("%Y-%m-%d %H:%M:%S"),
                truncate(&obs.agent_type, 8),
                truncate(&obs.metric_type, 16),
                obs.value,
                obs.campaign_id.as_deref().unwrap_or("-"),
            ));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: MetricArgs, json: bool) -> Result<()> {
    let ctx = AppContext::init().await?;

    match args.command {
        MetricCommands::Record {
            agent_type,
            metric_type,
            value,
            subtype,
            category,
            campaign,
            region,
            platform,
        } => {
            let mut obs = MetricObservation::new(agent_type, metric_type, value);
            obs.metric_subtype = subtype;
            obs.category = category;
            obs.campaign_id = campaign;
            obs.region = region;
            obs.platform = platform;

            ctx.metric_source.insert(&obs).await?;
            output(
                &MetricRecordedOutput {
                    id: obs.id.to_string(),
                    agent_type: obs.agent_type,
                    metric_type: obs.metric_type,
                    value: obs.value,
                },
                json,
            );
        }
        MetricCommands::List {
            hours,
            agent_type,
            metric_type,
            limit,
        } => {
            let query = MetricQuery {
                agent_type,
                metric_type,
                lookback: Some(Duration::from_secs(hours * 3600)),
                limit: Some(limit),
                ..MetricQuery::default()
            };
            let observations = ctx.metric_source.query(&query).await?;
            let out = MetricListOutput {
                total: observations.len(),
                observations,
            };
            output(&out, json);
        }
    }

    Ok(())
}
