//! Service layer: the trigger/execution/learning core.

pub mod alerts;
pub mod builtins;
pub mod evaluator;
pub mod learner;
pub mod registry;
pub mod scheduler;
pub mod stats;

pub use alerts::AlertNotifier;
pub use builtins::builtin_rules;
pub use evaluator::TriggerEvaluator;
pub use learner::{AdjustmentKind, AppliedAdjustment, FeedbackLearner, OutcomeAnalysis};
pub use registry::ActionRegistry;
pub use scheduler::ExecutionScheduler;
pub use stats::ExecutionStats;
