//! Deployer.
//!
//! Executes approved fixes against the actuation sandbox. Deployment is
//! all-or-nothing per fix: `deploy_started` is published before any action
//! executes, and the first failing action yields `deploy_failed` with the
//! action index and error retained; no partial rollback is attempted.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::fix::{Fix, FixStatus};
use crate::domain::ports::actuation::ActuationSandbox;
use crate::services::event_bus::{BusEvent, EventBus, EventPayload, Topic};
use crate::services::fix_store::FixStore;

pub struct Deployer {
    bus: Arc<EventBus>,
    store: Arc<FixStore>,
    sandbox: Arc<dyn ActuationSandbox>,
}

impl Deployer {
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
        info!("deployer running");
        loop {
            match rx.recv().await {
                Ok(BusEvent {
                    topic: Topic::FixDeployRequested,
                    payload: EventPayload::Fix(fix),
                    ..
                }) => {
                    let deployer = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(err) = deployer.deploy(&fix.fix_id).await {
                            // An already-started deployment resurfacing as a
                            // duplicate request is rejected by the state
                            // machine, which is what makes deploys idempotent.
                            debug!(fix_id = %fix.fix_id, %err, "deploy request not applied");
                        }
                    });
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "deployer lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Execute one fix. Public so the deployment path is drivable in
    /// integration tests without the bus loop.
    pub async fn deploy(&self, fix_id: &str) -> DomainResult<()> {
        let fix = self.transition(fix_id, FixStatus::DeployStarted, |_| Ok(())).await?;
        info!(%fix_id, actions = fix.actions.len(), "deploy started");

        for (index, action) in fix.actions.iter().enumerate() {
            let ordinal = index + 1;
            if let Err(err) = self.sandbox.apply(fix_id, action).await {
                let failure = DomainError::DeployActionFailure {
                    fix_id: fix_id.to_string(),
                    index: ordinal,
                    message: err.to_string(),
                };
                error!(%fix_id, action = ordinal, %err, "action failed, aborting deploy");
                let note = format!("deploy action {ordinal} failed: {err}");
                self.transition(fix_id, FixStatus::DeployFailed, move |f| {
                    f.append_review_note(note);
                    Ok(())
                })
                .await?;
                return Err(failure);
            }
            debug!(%fix_id, action = ordinal, "action actuated");
        }

        self.transition(fix_id, FixStatus::DeploySucceeded, |_| Ok(()))
            .await?;
        info!(%fix_id, "deploy succeeded");
        Ok(())
    }

    async fn transition<F>(&self, fix_id: &str, to: FixStatus, mutate: F) -> DomainResult<Fix>
    where
        F: FnOnce(&mut Fix) -> DomainResult<()>,
    {
        let fix = self
            .store
            .update(fix_id, |f| {
                mutate(f)?;
                f.transition_to(to)
            })
            .await?;
        self.bus.publish_fix(&fix).await;
        Ok(fix)
    }
}
