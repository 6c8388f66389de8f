use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for adwatch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Control-loop and scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Retry policy configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Feedback-learning configuration
    #[serde(default)]
    pub learning: LearningConfig,

    /// Alert channel configuration
    #[serde(default)]
    pub alerts: AlertConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".adwatch/adwatch.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional directory for rotated log files
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Control-loop and scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Seconds between evaluation passes
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Maximum actions executing in parallel within one priority group
    #[serde(default = "default_max_concurrent_actions")]
    pub max_concurrent_actions: usize,

    /// Hours of metric history fetched for each evaluation pass
    #[serde(default = "default_metric_lookback_hours")]
    pub metric_lookback_hours: u64,

    /// Days of execution history retained before pruning
    #[serde(default = "default_execution_retention_days")]
    pub execution_retention_days: u32,
}

const fn default_tick_interval_secs() -> u64 {
    60
}

const fn default_max_concurrent_actions() -> usize {
    3
}

const fn default_metric_lookback_hours() -> u64 {
    24
}

const fn default_execution_retention_days() -> u32 {
    30
}

impl SchedulerConfig {
    pub fn metric_lookback(&self) -> Duration {
        Duration::from_secs(self.metric_lookback_hours * 3600)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            max_concurrent_actions: default_max_concurrent_actions(),
            metric_lookback_hours: default_metric_lookback_hours(),
            execution_retention_days: default_execution_retention_days(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Cap on any single retry delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

const fn default_base_delay_ms() -> u64 {
    5_000
}

const fn default_backoff_multiplier() -> f64 {
    2.0
}

const fn default_max_delay_ms() -> u64 {
    300_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Feedback-learning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LearningConfig {
    /// Step size for weight/confidence adjustments, in (0, 1]
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Minimum analysis confidence before adjustments are applied
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Sample size at which the reliability factor saturates
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: u64,

    /// Default lookback for batch learning, in hours
    #[serde(default = "default_batch_window_hours")]
    pub batch_window_hours: u64,
}

const fn default_learning_rate() -> f64 {
    0.1
}

const fn default_confidence_threshold() -> f64 {
    0.6
}

const fn default_min_sample_size() -> u64 {
    10
}

const fn default_batch_window_hours() -> u64 {
    24
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            confidence_threshold: default_confidence_threshold(),
            min_sample_size: default_min_sample_size(),
            batch_window_hours: default_batch_window_hours(),
        }
    }
}

/// Alert channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AlertConfig {
    /// Webhook URL notified when a pass has failed actions
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Cap on alert deliveries per minute
    #[serde(default = "default_max_alerts_per_minute")]
    pub max_alerts_per_minute: u32,
}

const fn default_max_alerts_per_minute() -> u32 {
    6
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            max_alerts_per_minute: default_max_alerts_per_minute(),
        }
    }
}
