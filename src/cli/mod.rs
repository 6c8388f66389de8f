//! Command-line interface for adwatch.

pub mod commands;
pub mod context;
pub mod output;

use clap::{Parser, Subcommand};

pub use output::{handle_error, output, truncate, CommandOutput};

#[derive(Parser, Debug)]
#[command(
    name = "adwatch",
    about = "Autonomous performance watchdog for marketing automation",
    version
)]
pub struct Cli {
    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control loop (or a single pass with --once)
    Run(commands::run::RunArgs),
    /// Manage trigger rules
    Rule(commands::rule::RuleArgs),
    /// Record and inspect metric observations
    Metric(commands::metric::MetricArgs),
    /// Manually trigger an action, bypassing the evaluator
    Trigger(commands::trigger::TriggerArgs),
    /// Execution statistics over a rolling window
    Stats(commands::stats::StatsArgs),
    /// Inspect learned weights and insights
    Weight(commands::weight::WeightArgs),
}
