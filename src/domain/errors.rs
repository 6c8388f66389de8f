//! Domain errors for the adwatch control loop.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the adwatch system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Rule not found: {0}")]
    RuleNotFound(Uuid),

    #[error("Execution record not found: {0}")]
    ExecutionNotFound(Uuid),

    #[error("Rule evaluation failed for '{rule}': {reason}")]
    RuleEvaluation { rule: String, reason: String },

    #[error("No executor registered for action type: {0}")]
    UnknownActionType(String),

    #[error("Executor already registered for action type: {0}")]
    DuplicateActionType(String),

    #[error("Validation failed for action '{action_type}': {reason}")]
    ValidationFailure { action_type: String, reason: String },

    #[error("Action execution failed: {0}")]
    ExecutionFailure(String),

    #[error("Rollback not supported by action type: {0}")]
    RollbackUnsupported(String),

    #[error("Scheduler fault: {0}")]
    SchedulerFault(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
