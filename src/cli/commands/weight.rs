//! Learned weight and insight inspection.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::context::AppContext;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::{LearningInsight, MetricWeight, WeightKey};
use crate::domain::ports::WeightStore;

#[derive(Args, Debug)]
pub struct WeightArgs {
    #[command(subcommand)]
    pub command: WeightCommands,
}

#[derive(Subcommand, Debug)]
pub enum WeightCommands {
    /// List active weights
    List,
    /// Show the full version history for one key
    History {
        /// Agent type
        agent_type: String,
        /// Metric type
        metric_type: String,
        /// Optional metric subtype
        #[arg(long)]
        subtype: Option<String>,
        /// Optional category
        #[arg(long)]
        category: Option<String>,
        /// Optional scope tag (campaign id, region, ...)
        #[arg(long)]
        scope: Option<String>,
    },
    /// List recent learning insights
    Insights {
        /// Maximum rows
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct WeightListOutput {
    pub weights: Vec<MetricWeight>,
    pub total: usize,
}

fn weight_lines(weights: &[MetricWeight]) -> Vec<String> {
    let mut lines = vec![format!(
        "{:<34} {:<4} {:<8} {:<12} {:<11} {:<8}",
        "KEY", "VER", "WEIGHT", "THRESHOLD", "CONFIDENCE", "SAMPLES"
    )];
    lines.push("-".repeat(80));
    for w in weights {
        lines.push(format!(
            "{:<34} {:<4} {:<8.3} {:<12} {:<11.3} {:<8}",
            truncate(&w.key.to_string(), 32),
            w.version,
            w.weight,
            w.threshold
                .map_or_else(|| "-".to_string(), |t| format!("{t:.4}")),
            w.confidence,
            w.sample_size,
        ));
    }
    lines
}

impl CommandOutput for WeightListOutput {
    fn to_human(&self) -> String {
        if self.weights.is_empty() {
            return "No learned weights yet.".to_string();
        }
        let mut lines = vec![format!("{} active weight(s):\n", self.total)];
        lines.extend(weight_lines(&self.weights));
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct WeightHistoryOutput {
    pub key: WeightKey,
    pub versions: Vec<MetricWeight>,
}

impl CommandOutput for WeightHistoryOutput {
    fn to_human(&self) -> String {
        if self.versions.is_empty() {
            return format!("No versions recorded for {}.", self.key);
        }
        let mut lines = vec![format!(
            "{} version(s) for {} (newest first):\n",
            self.versions.len(),
            self.key
        )];
        lines.extend(weight_lines(&self.versions));
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct InsightListOutput {
    pub insights: Vec<LearningInsight>,
    pub total: usize,
}

impl CommandOutput for InsightListOutput {
    fn to_human(&self) -> String {
        if self.insights.is_empty() {
            return "No insights recorded.".to_string();
        }
        let mut lines = vec![format!("{} insight(s):\n", self.total)];
        for insight in &self.insights {
            lines.push(format!(
                "[{}] {} ({}): {}",
                insight.priority.as_str(),
                insight.title,
                insight.kind.as_str(),
                truncate(&insight.detail, 72),
            ));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: WeightArgs, json: bool) -> Result<()> {
    let ctx = AppContext::init().await?;

    match args.command {
        WeightCommands::List => {
            let weights = ctx.weight_store.list_active().await?;
            let out = WeightListOutput {
                total: weights.len(),
                weights,
            };
            output(&out, json);
        }
        WeightCommands::History {
            agent_type,
            metric_type,
            subtype,
            category,
            scope,
        } => {
            let key = WeightKey {
                agent_type,
                metric_type,
                metric_subtype: subtype,
                category,
                scope,
            };
            let versions = ctx.weight_store.history(&key).await?;
            output(&WeightHistoryOutput { key, versions }, json);
        }
        WeightCommands::Insights { limit } => {
            let insights = ctx.weight_store.recent_insights(limit).await?;
            let out = InsightListOutput {
                total: insights.len(),
                insights,
            };
            output(&out, json);
        }
    }

    Ok(())
}
