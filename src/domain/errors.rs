//! Domain errors for the Chronos remediation core.
//!
//! No error here is fatal to the process: every failure resolves to a valid
//! terminal or intermediate fix state, so a fix is always in exactly one
//! well-defined state.

use thiserror::Error;

/// Domain-level errors that can occur in the remediation core.
#[derive(Debug, Error)]
pub enum DomainError {
    /// AI call transport/parse failure. Recovered locally by falling back
    /// to the rules strategy; never surfaced to the strategy caller.
    #[error("Strategy unavailable: {0}")]
    StrategyUnavailable(String),

    /// Merge window elapsed before all sub-tasks reported. Recovered by
    /// merging the partials that did arrive with degraded confidence.
    #[error("Merge timed out for problem {problem_id}: {received} of {expected} partials received")]
    MergeTimeout {
        problem_id: String,
        received: usize,
        expected: usize,
    },

    /// Attempt to apply a lifecycle event out of order. The original state
    /// is preserved and the operation is rejected.
    #[error("Invalid transition for fix {fix_id}: {from} -> {to} ({reason})")]
    InvalidTransition {
        fix_id: String,
        from: String,
        to: String,
        reason: String,
    },

    /// One action's simulated actuation errored; surfaces as deploy_failed
    /// with the action index and message retained.
    #[error("Deploy action {index} failed for fix {fix_id}: {message}")]
    DeployActionFailure {
        fix_id: String,
        index: usize,
        message: String,
    },

    /// Verification window elapsed without a passing sample. A normal
    /// failed outcome, not an exception.
    #[error("Verification timed out for fix {fix_id}, metric {metric_name}")]
    VerificationTimeout { fix_id: String, metric_name: String },

    /// Rollback cannot fail in the simulated sandbox, but real actuation
    /// backends can; the kind exists so they have something to surface.
    #[error("Rollback failed for fix {fix_id}: {message}")]
    RollbackFailure { fix_id: String, message: String },

    #[error("Fix not found: {0}")]
    FixNotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
