//! Tracing subscriber bootstrap.

use anyhow::{anyhow, Result};
use std::io;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::models::LoggingConfig;

/// Initialized logger; hold the guard for the lifetime of the process so
/// buffered file output is flushed.
pub struct Logger {
    _guard: Option<WorkerGuard>,
}

impl Logger {
    /// Initialize the global subscriber from config. `RUST_LOG` overrides
    /// the configured level.
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let default_level = parse_log_level(&config.level)?;
        let env_filter = EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy();

        let guard = if let Some(ref log_dir) = config.log_dir {
            let file_appender = rolling::daily(log_dir, "adwatch.log");
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            // File output is always JSON for structured ingestion.
            let file_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_target(true);

            let stderr_layer = stderr_layer(&config.format).with_filter(env_filter);
            tracing_subscriber::registry()
                .with(file_layer)
                .with(stderr_layer)
                .init();

            Some(guard)
        } else {
            let stderr_layer = stderr_layer(&config.format).with_filter(env_filter);
            tracing_subscriber::registry().with(stderr_layer).init();
            None
        };

        Ok(Self { _guard: guard })
    }
}

fn stderr_layer<S>(format: &str) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    if format == "json" {
        Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_target(true),
        )
    } else {
        Box::new(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true),
        )
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(anyhow!("Invalid log level: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels_parse() {
        assert!(parse_log_level("debug").is_ok());
        assert!(parse_log_level("verbose").is_err());
    }
}
