//! Hierarchical configuration loading.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid max_concurrent_actions: {0}. Must be at least 1")]
    InvalidMaxConcurrentActions(usize),

    #[error("Invalid tick_interval_secs: {0}. Must be at least 1")]
    InvalidTickInterval(u64),

    #[error("Invalid learning_rate: {0}. Must be in (0, 1]")]
    InvalidLearningRate(f64),

    #[error("Invalid confidence_threshold: {0}. Must be in [0, 1]")]
    InvalidConfidenceThreshold(f64),

    #[error("Invalid backoff_multiplier: {0}. Must be at least 1")]
    InvalidBackoffMultiplier(f64),

    #[error(
        "Invalid retry delays: base_delay_ms ({0}) must not exceed max_delay_ms ({1})"
    )]
    InvalidRetryDelays(u64, u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .adwatch/config.yaml (project config)
    /// 3. .adwatch/local.yaml (project local overrides, optional)
    /// 4. Environment variables (`ADWATCH_*` prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".adwatch/config.yaml"))
            .merge(Yaml::file(".adwatch/local.yaml"))
            .merge(Env::prefixed("ADWATCH_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.scheduler.max_concurrent_actions == 0 {
            return Err(ConfigError::InvalidMaxConcurrentActions(
                config.scheduler.max_concurrent_actions,
            ));
        }
        if config.scheduler.tick_interval_secs == 0 {
            return Err(ConfigError::InvalidTickInterval(
                config.scheduler.tick_interval_secs,
            ));
        }

        if config.learning.learning_rate <= 0.0 || config.learning.learning_rate > 1.0 {
            return Err(ConfigError::InvalidLearningRate(
                config.learning.learning_rate,
            ));
        }
        if !(0.0..=1.0).contains(&config.learning.confidence_threshold) {
            return Err(ConfigError::InvalidConfidenceThreshold(
                config.learning.confidence_threshold,
            ));
        }

        if config.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidBackoffMultiplier(
                config.retry.backoff_multiplier,
            ));
        }
        if config.retry.base_delay_ms > config.retry.max_delay_ms {
            return Err(ConfigError::InvalidRetryDelays(
                config.retry.base_delay_ms,
                config.retry.max_delay_ms,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ConfigLoader::validate(&Config::default()).is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = Config::default();
        config.scheduler.max_concurrent_actions = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxConcurrentActions(0))
        ));
    }

    #[test]
    fn learning_rate_bounds_are_enforced() {
        let mut config = Config::default();
        config.learning.learning_rate = 0.0;
        assert!(ConfigLoader::validate(&config).is_err());

        config.learning.learning_rate = 1.5;
        assert!(ConfigLoader::validate(&config).is_err());

        config.learning.learning_rate = 1.0;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn inverted_retry_delays_are_rejected() {
        let mut config = Config::default();
        config.retry.base_delay_ms = 10_000;
        config.retry.max_delay_ms = 5_000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRetryDelays(10_000, 5_000))
        ));
    }
}
