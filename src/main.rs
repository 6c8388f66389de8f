//! adwatch CLI entry point.

use clap::Parser;

use adwatch::cli::{handle_error, Cli, Commands};
use adwatch::infrastructure::{ConfigLoader, Logger};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging comes up before anything touches the database; a broken
    // config file falls back to defaults so the error itself is visible.
    let logging = ConfigLoader::load()
        .map(|c| c.logging)
        .unwrap_or_default();
    let _logger = match Logger::init(&logging) {
        Ok(logger) => logger,
        Err(err) => {
            eprintln!("Failed to initialize logging: {err:#}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run(args) => adwatch::cli::commands::run::execute(args, cli.json).await,
        Commands::Rule(args) => adwatch::cli::commands::rule::execute(args, cli.json).await,
        Commands::Metric(args) => adwatch::cli::commands::metric::execute(args, cli.json).await,
        Commands::Trigger(args) => adwatch::cli::commands::trigger::execute(args, cli.json).await,
        Commands::Stats(args) => adwatch::cli::commands::stats::execute(args, cli.json).await,
        Commands::Weight(args) => adwatch::cli::commands::weight::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
