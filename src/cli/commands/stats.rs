//! Execution statistics over a rolling window.

use anyhow::Result;
use clap::Args;
use comfy_table::Table;

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{StatsBucket, StatsReport};

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Window in hours
    #[arg(long, default_value_t = 24)]
    pub hours: u64,
}

#[derive(Debug, serde::Serialize)]
pub struct StatsOutput {
    #[serde(flatten)]
    pub report: StatsReport,
}

fn bucket_table(title: &str, buckets: &[StatsBucket]) -> String {
    let mut table = Table::new();
    table.set_header(vec![title, "TOTAL", "SUCCEEDED", "FAILED"]);
    for bucket in buckets {
        table.add_row(vec![
            bucket.key.clone(),
            bucket.total.to_string(),
            bucket.succeeded.to_string(),
            bucket.failed.to_string(),
        ]);
    }
    table.to_string()
}

impl CommandOutput for StatsOutput {
    fn to_human(&self) -> String {
        let r = &self.report;
        let mut sections = vec![format!(
            "Executions over the last {}h: {} total, {} succeeded, {} failed",
            r.window_hours, r.total, r.succeeded, r.failed
        )];
        if !r.by_action_type.is_empty() {
            sections.push(bucket_table("ACTION TYPE", &r.by_action_type));
        }
        if !r.by_agent_type.is_empty() {
            sections.push(bucket_table("AGENT TYPE", &r.by_agent_type));
        }
        sections.join("\n\n")
    }
}

pub async fn execute(args: StatsArgs, json: bool) -> Result<()> {
    let ctx = AppContext::init().await?;
    let report = ctx.stats.report(args.hours).await?;
    output(&StatsOutput { report }, json);
    Ok(())
}
