//! Actuation sandbox port.
//!
//! Deployment and rollback execute fix actions against this seam. The
//! shipped adapter is a simulated sandbox; a real actuation backend would
//! implement the same trait.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::fix::FixAction;

/// Errors from an actuation backend.
#[derive(Debug, Error)]
pub enum ActuationError {
    #[error("Actuation rejected: {0}")]
    Rejected(String),

    #[error("Actuation backend unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),
}

/// Port trait for executing fix actions.
#[async_trait]
pub trait ActuationSandbox: Send + Sync {
    /// Apply one action. Called in order; the deployer stops at the first
    /// error (all-or-nothing per fix).
    async fn apply(&self, fix_id: &str, action: &FixAction) -> Result<(), ActuationError>;

    /// Re-apply the inverse of one action's parameters during rollback.
    async fn revert(&self, fix_id: &str, action: &FixAction) -> Result<(), ActuationError>;
}
