//! adwatch - Autonomous Performance Watchdog
//!
//! adwatch embeds a performance-management control loop in a
//! marketing-automation platform: it watches streams of numeric metrics,
//! fires remediation actions when configured conditions are violated, and
//! tunes its own weights and thresholds from the outcomes it observes.
//!
//! # Architecture
//!
//! The crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure models, port traits, and errors
//! - **Service Layer** (`services`): Evaluation, scheduling, and learning
//! - **Application Layer** (`application`): The periodic control-loop driver
//! - **Adapters** (`adapters`): SQLite persistence and built-in executors
//! - **Infrastructure** (`infrastructure`): Config loading and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Control flow
//!
//! ```text
//! RuleStore + MetricSource
//!        │
//!        ▼
//! TriggerEvaluator ──► ExecutionScheduler ──► ActionRegistry(executors)
//!                              │
//!                              ▼
//!                        ExecutionLog ──► FeedbackLearner ──► WeightStore
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{ControlLoop, LoopState, LoopStats};
pub use domain::models::{
    ActionParams, ActionPriority, ActionTrigger, Config, ExecutionRecord, ExecutionResult,
    ExecutionStatus, LearningInsight, MetricObservation, MetricQuery, MetricWeight, PassOutcome,
    Rule, RuleScope, RunSummary, TriggerCondition, WeightKey,
};
pub use domain::ports::{ActionExecutor, ExecutionLog, MetricSource, RuleStore, WeightStore};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::{ConfigError, ConfigLoader, Logger};
pub use services::{
    ActionRegistry, AlertNotifier, ExecutionScheduler, ExecutionStats, FeedbackLearner,
    TriggerEvaluator,
};
