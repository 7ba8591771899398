//! Rollback handler.
//!
//! Reverses a flagged fix by re-applying the inverse of each action's
//! parameters through the sandbox, in reverse order. The simulated sandbox
//! cannot fail a revert, so the outcome is always `rollback_succeeded`;
//! the `RollbackFailure` error kind exists for real actuation backends
//! and is logged if a revert ever errors.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::fix::{Fix, FixStatus};
use crate::domain::ports::actuation::ActuationSandbox;
use crate::services::event_bus::{BusEvent, EventBus, EventPayload, Topic};
use crate::services::fix_store::FixStore;

pub struct RollbackHandler {
    bus: Arc<EventBus>,
    store: Arc<FixStore>,
    sandbox: Arc<dyn ActuationSandbox>,
}

impl RollbackHandler {
    pub fn new(
        bus: Arc<EventBus>,
        store: Arc<FixStore>,
        sandbox: Arc<dyn ActuationSandbox>,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            store,
            sandbox,
        })
    }

    pub async fn run(self: Arc<Self>, mut rx: broadcast::Receiver<BusEvent>) {
        info!("rollback handler running");
        loop {
            match rx.recv().await {
                Ok(BusEvent {
                    topic: Topic::FixRollbackRequested,
                    payload: EventPayload::Fix(fix),
                    ..
                }) if fix.status == FixStatus::RollbackRequested => {
                    let handler = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(err) = handler.roll_back(&fix.fix_id).await {
                            error!(fix_id = %fix.fix_id, %err, "rollback failed");
                        }
                    });
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "rollback handler lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Revert one fix's actions and mark it rolled back.
    pub async fn roll_back(&self, fix_id: &str) -> DomainResult<()> {
        let Some(fix) = self.store.get(fix_id).await else {
            return Err(DomainError::FixNotFound(fix_id.to_string()));
        };

        for (index, action) in fix.actions.iter().enumerate().rev() {
            if let Err(err) = self.sandbox.revert(fix_id, action).await {
                // Recognized error kind for future real-actuation backends;
                // the simulated sandbox never takes this path.
                let failure = DomainError::RollbackFailure {
                    fix_id: fix_id.to_string(),
                    message: format!("action {}: {err}", index + 1),
                };
                error!(%failure, "revert errored");
                return Err(failure);
            }
        }

        let fix = self
            .store
            .update(fix_id, |f| f.transition_to(FixStatus::RollbackSucceeded))
            .await?;
        self.bus.publish_fix(&fix).await;
        info!(%fix_id, "rollback succeeded");
        Ok(())
    }
}
