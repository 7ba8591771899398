//! Simulated actuation sandbox.
//!
//! Executes fix actions against an in-memory world: applies record what
//! would have been commanded, reverts undo them. Tests can inject per-
//! entity failures to exercise the all-or-nothing deploy policy.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::models::fix::FixAction;
use crate::domain::ports::actuation::{ActuationError, ActuationSandbox};

/// One recorded actuation.
#[derive(Debug, Clone)]
pub struct ActuationLogEntry {
    pub fix_id: String,
    pub entity_id: String,
    pub action_kind: String,
    pub reverted: bool,
    pub at: DateTime<Utc>,
}

/// In-memory sandbox. Applies always succeed unless the entity has been
/// marked to fail; reverts always succeed.
#[derive(Default)]
pub struct SimulatedSandbox {
    log: Arc<RwLock<Vec<ActuationLogEntry>>>,
    failing_entities: Arc<RwLock<HashSet<String>>>,
}

impl SimulatedSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future apply for this entity fail.
    pub async fn fail_entity(&self, entity_id: impl Into<String>) {
        self.failing_entities.write().await.insert(entity_id.into());
    }

    pub async fn applied_count(&self) -> usize {
        self.log.read().await.iter().filter(|e| !e.reverted).count()
    }

    pub async fn reverted_count(&self) -> usize {
        self.log.read().await.iter().filter(|e| e.reverted).count()
    }

    pub async fn entries(&self) -> Vec<ActuationLogEntry> {
        self.log.read().await.clone()
    }
}

#[async_trait]
impl ActuationSandbox for SimulatedSandbox {
    async fn apply(&self, fix_id: &str, action: &FixAction) -> Result<(), ActuationError> {
        let entity_id = &action.action.entity_id;
        if self.failing_entities.read().await.contains(entity_id) {
            return Err(ActuationError::Rejected(format!(
                "simulated actuation failure for {entity_id}"
            )));
        }

        debug!(
            fix_id,
            entity_id,
            action_kind = %action.action.action_kind,
            "sandbox apply"
        );
        self.log.write().await.push(ActuationLogEntry {
            fix_id: fix_id.to_string(),
            entity_id: entity_id.clone(),
            action_kind: action.action.action_kind.to_string(),
            reverted: false,
            at: Utc::now(),
        });
        Ok(())
    }

    async fn revert(&self, fix_id: &str, action: &FixAction) -> Result<(), ActuationError> {
        debug!(
            fix_id,
            entity_id = %action.action.entity_id,
            action_kind = %action.action.action_kind,
            "sandbox revert"
        );
        self.log.write().await.push(ActuationLogEntry {
            fix_id: fix_id.to_string(),
            entity_id: action.action.entity_id.clone(),
            action_kind: action.action.action_kind.to_string(),
            reverted: true,
            at: Utc::now(),
        });
        Ok(())
    }
}
