//! Run the control loop until interrupted.

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use tracing::info;

use crate::application::ControlLoop;
use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::RunSummary;
use crate::domain::ports::MetricSource;
use crate::services::TriggerEvaluator;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run exactly one evaluation pass and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct PassOutput {
    #[serde(flatten)]
    pub summary: RunSummary,
}

impl CommandOutput for PassOutput {
    fn to_human(&self) -> String {
        let s = &self.summary;
        let mut lines = vec![format!(
            "Pass complete: {} triggered, {} succeeded, {} failed, {} skipped",
            s.triggered, s.succeeded, s.failed, s.skipped
        )];
        for failure in &s.failures {
            lines.push(format!(
                "  failure: {} ({}): {}",
                failure.action_type,
                failure.rule_name.as_deref().unwrap_or("manual"),
                failure.reason
            ));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: RunArgs, json: bool) -> Result<()> {
    let ctx = AppContext::init().await?;

    let control_loop = ControlLoop::new(
        TriggerEvaluator::new(),
        ctx.scheduler.clone(),
        ctx.learner.clone(),
        ctx.rule_store.clone(),
        ctx.metric_source.clone() as Arc<dyn MetricSource>,
        ctx.execution_log.clone(),
        &ctx.config.scheduler,
    );

    if args.once {
        let summary = control_loop.run_once().await?;
        output(&PassOutput { summary }, json);
        return Ok(());
    }

    control_loop.start().await?;
    info!("Control loop running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received; shutting down");
    control_loop.stop().await?;

    let stats = control_loop.stats().await;
    if let Some(summary) = stats.last_summary {
        output(&PassOutput { summary }, json);
    }
    Ok(())
}
