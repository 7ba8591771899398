//! Verification engine.
//!
//! For each action of a deployed fix, runs an independent polling loop
//! that samples the action's metric at a fixed cadence until the window
//! elapses. An action passes the moment a sample crosses its threshold in
//! the favorable direction; otherwise it fails exactly at window expiry.
//! The fix verifies only if every action passes; one failure fails the
//! whole fix and requests a rollback, mirroring the all-or-nothing deploy
//! policy. Loops are cancelled if a pre-empting terminal event arrives.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::config::VerificationConfig;
use crate::domain::models::fix::{Fix, FixAction, FixStatus};
use crate::domain::models::verification::{VerificationRecord, VerificationStatus};
use crate::domain::ports::telemetry::TelemetrySource;
use crate::services::event_bus::{BusEvent, EventBus, EventPayload, Topic};
use crate::services::fix_store::FixStore;

/// Outcome of one action's polling loop.
#[derive(Debug, Clone, PartialEq)]
enum ActionOutcome {
    Passed { value: f64 },
    Skipped,
    Failed,
    Cancelled,
}

pub struct VerificationEngine {
    config: VerificationConfig,
    bus: Arc<EventBus>,
    store: Arc<FixStore>,
    telemetry: Arc<dyn TelemetrySource>,
    records: Arc<RwLock<HashMap<String, VerificationRecord>>>,
    cancels: Arc<Mutex<HashMap<String, watch::Sender<bool>>>>,
}

impl VerificationEngine {
    pub fn new(
        config: VerificationConfig,
        bus: Arc<EventBus>,
        store: Arc<FixStore>,
        telemetry: Arc<dyn TelemetrySource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            bus,
            store,
            telemetry,
            records: Arc::new(RwLock::new(HashMap::new())),
            cancels: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub async fn run(self: Arc<Self>, mut rx: broadcast::Receiver<BusEvent>) {
        info!(
            sample_interval_ms = self.config.sample_interval_ms,
            "verification engine running"
        );
        loop {
            match rx.recv().await {
                Ok(event) => match (event.topic, event.payload) {
                    (Topic::FixDeploySucceeded, EventPayload::Fix(fix)) => {
                        let engine = Arc::clone(&self);
                        tokio::spawn(async move {
                            if let Err(err) = engine.verify_fix(&fix).await {
                                warn!(fix_id = %fix.fix_id, %err, "verification aborted");
                            }
                        });
                    }
                    // A terminal event for the fix pre-empts its window.
                    (Topic::FixRollbackRequested | Topic::FixDeployFailed, EventPayload::Fix(fix)) => {
                        self.cancel(&fix.fix_id).await;
                    }
                    _ => {}
                },
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "verification engine lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Verify one deployed fix. Public so integration tests can drive the
    /// engine without the bus loop.
    pub async fn verify_fix(&self, fix: &Fix) -> DomainResult<()> {
        let fix_id = fix.fix_id.clone();
        let deploy_time = fix.deployed_at.unwrap_or_else(Utc::now);

        {
            let mut records = self.records.write().await;
            records.insert(
                fix_id.clone(),
                VerificationRecord::start(fix_id.clone(), fix.actions.len()),
            );
        }
        let cancel_rx = {
            let (tx, rx) = watch::channel(false);
            self.cancels.lock().await.insert(fix_id.clone(), tx);
            rx
        };
        info!(%fix_id, actions = fix.actions.len(), "verification started");

        let loops = fix.actions.iter().enumerate().map(|(index, action)| {
            self.action_loop(fix_id.clone(), index + 1, action.clone(), deploy_time, cancel_rx.clone())
        });
        let outcomes = join_all(loops).await;

        self.cancels.lock().await.remove(&fix_id);

        if outcomes.contains(&ActionOutcome::Cancelled) {
            let mut records = self.records.write().await;
            if let Some(record) = records.get_mut(&fix_id) {
                record.log("cancelled", "Verification pre-empted by a terminal event");
            }
            debug!(%fix_id, "verification cancelled");
            return Ok(());
        }

        let status = {
            let mut records = self.records.write().await;
            let record = records
                .get_mut(&fix_id)
                .ok_or_else(|| DomainError::FixNotFound(fix_id.clone()))?;
            record.finalize()
        };

        match status {
            VerificationStatus::Verified => {
                let fix = self
                    .store
                    .update(&fix_id, |f| f.transition_to(FixStatus::Verified))
                    .await?;
                self.bus.publish_fix(&fix).await;
                info!(%fix_id, "all actions verified");
            }
            _ => {
                let failed = {
                    let records = self.records.read().await;
                    records.get(&fix_id).map(|r| r.metrics.failed).unwrap_or(0)
                };
                let reason =
                    format!("verification failed: {failed} action(s) did not meet criteria");
                // The intermediate verification_failed state and the
                // rollback request surface externally as one
                // fix.rollback_requested event carrying the final record.
                let fix = self
                    .store
                    .update(&fix_id, |f| {
                        f.transition_to(FixStatus::VerificationFailed)?;
                        if f.rollback_reason.is_none() {
                            f.rollback_reason = Some(reason.clone());
                        }
                        f.transition_to(FixStatus::RollbackRequested)
                    })
                    .await?;
                self.bus.publish_fix(&fix).await;
                warn!(%fix_id, "verification failed, rollback requested");
            }
        }
        Ok(())
    }

    /// Poll one action's metric until it passes, the window expires, or
    /// the verification is cancelled.
    async fn action_loop(
        &self,
        fix_id: String,
        ordinal: usize,
        action: FixAction,
        deploy_time: DateTime<Utc>,
        mut cancel_rx: watch::Receiver<bool>,
    ) -> ActionOutcome {
        let spec = &action.verification;
        if spec.metric_name.is_empty() {
            let mut records = self.records.write().await;
            if let Some(record) = records.get_mut(&fix_id) {
                record.action_skipped(ordinal, "no verification criteria");
            }
            return ActionOutcome::Skipped;
        }

        let interval = Duration::from_millis(self.config.sample_interval_ms);
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(spec.window_seconds);

        loop {
            if let Some(sample) = self.telemetry.latest(&spec.metric_name, deploy_time).await {
                if spec.is_satisfied_by(sample.value) {
                    let mut records = self.records.write().await;
                    if let Some(record) = records.get_mut(&fix_id) {
                        record.action_passed(ordinal, &spec.metric_name, sample.value);
                    }
                    return ActionOutcome::Passed {
                        value: sample.value,
                    };
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                // Window expiry is a normal failed outcome, not an exception.
                let timeout = DomainError::VerificationTimeout {
                    fix_id: fix_id.clone(),
                    metric_name: spec.metric_name.clone(),
                };
                debug!(%timeout, "action window expired");
                let mut records = self.records.write().await;
                if let Some(record) = records.get_mut(&fix_id) {
                    record.action_failed(ordinal, &spec.metric_name, spec.threshold);
                }
                return ActionOutcome::Failed;
            }

            let next_sample = std::cmp::min(now + interval, deadline);
            tokio::select! {
                _ = tokio::time::sleep_until(next_sample) => {}
                changed = cancel_rx.changed() => {
                    if changed.is_err() || *cancel_rx.borrow() {
                        return ActionOutcome::Cancelled;
                    }
                }
            }
        }
    }

    /// Cancel an in-flight verification, if any.
    pub async fn cancel(&self, fix_id: &str) {
        if let Some(tx) = self.cancels.lock().await.get(fix_id) {
            let _ = tx.send(true);
            debug!(%fix_id, "verification cancel signalled");
        }
    }

    /// Snapshot of one verification record.
    pub async fn record(&self, fix_id: &str) -> Option<VerificationRecord> {
        self.records.read().await.get(fix_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::fix::VerificationSpec;
    use crate::domain::models::problem::{Location, Problem, ProblemType, Severity};
    use crate::domain::models::solution::{
        ActionKind, ActionParameters, EstimatedImpact, ProposedAction, Solution, SolutionType,
    };
    use crate::infrastructure::telemetry::InMemoryTelemetry;

    fn deployed_fix(metric: &str, threshold: f64, window_seconds: u64) -> Fix {
        let problem = Problem::new(
            "HOT-001",
            ProblemType::Hotspot,
            vec!["FLT-1".to_string()],
            Location::sector("sector-1"),
            Severity::Info,
        );
        let solution = Solution {
            solution_id: "SOL-RULES-HOT-001".to_string(),
            solution_type: SolutionType::SpeedAdjustment,
            problem_id: "HOT-001".to_string(),
            affected_entities: vec!["FLT-1".to_string()],
            proposed_actions: vec![ProposedAction {
                entity_id: "FLT-1".to_string(),
                action_kind: ActionKind::SpeedChange,
                parameters: ActionParameters::default(),
                reasoning: "meter".to_string(),
            }],
            estimated_impact: EstimatedImpact::default(),
            confidence_score: 0.85,
            generated_by: "rules-engine".to_string(),
            requires_approval: false,
        };
        let metric = metric.to_string();
        let mut fix = Fix::from_solution(&solution, &problem, "test", move |_| VerificationSpec {
            metric_name: metric.clone(),
            threshold,
            window_seconds,
        });
        fix.transition_to(FixStatus::DeployRequested).unwrap();
        fix.transition_to(FixStatus::DeployStarted).unwrap();
        fix.transition_to(FixStatus::DeploySucceeded).unwrap();
        fix
    }

    fn engine(
        telemetry: Arc<InMemoryTelemetry>,
        store: Arc<FixStore>,
    ) -> Arc<VerificationEngine> {
        VerificationEngine::new(
            VerificationConfig {
                sample_interval_ms: 100,
                default_window_seconds: 2,
            },
            Arc::new(EventBus::new(64)),
            store,
            telemetry,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_crossing_sample_passes_before_window() {
        let telemetry = Arc::new(InMemoryTelemetry::new());
        let store = Arc::new(FixStore::new());
        let fix = deployed_fix("hotspot_congestion", 0.5, 10);
        store.insert(fix.clone()).await;

        // Favorable sample available immediately.
        telemetry.push("hotspot_congestion", 0.3).await;

        let engine = engine(telemetry, Arc::clone(&store));
        engine.verify_fix(&fix).await.unwrap();

        let updated = store.get(&fix.fix_id).await.unwrap();
        assert_eq!(updated.status, FixStatus::Verified);
        assert!(updated.verified_at.is_some());

        let record = engine.record(&fix.fix_id).await.unwrap();
        assert_eq!(record.status, VerificationStatus::Verified);
        assert_eq!(record.metrics.passed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_crossing_fails_at_window_expiry() {
        let telemetry = Arc::new(InMemoryTelemetry::new());
        let store = Arc::new(FixStore::new());
        let fix = deployed_fix("hotspot_congestion", 0.5, 3);
        store.insert(fix.clone()).await;

        // Unfavorable samples only.
        telemetry.push("hotspot_congestion", 0.9).await;

        let engine = engine(telemetry, Arc::clone(&store));
        let started = tokio::time::Instant::now();
        engine.verify_fix(&fix).await.unwrap();
        let elapsed = started.elapsed();

        // Failure lands exactly at window expiry, not before.
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));

        let updated = store.get(&fix.fix_id).await.unwrap();
        assert_eq!(updated.status, FixStatus::RollbackRequested);
        assert!(updated
            .rollback_reason
            .as_deref()
            .unwrap()
            .contains("verification failed"));

        let record = engine.record(&fix.fix_id).await.unwrap();
        assert_eq!(record.status, VerificationStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_crossing_passes_mid_window() {
        let telemetry = Arc::new(InMemoryTelemetry::new());
        let store = Arc::new(FixStore::new());
        let fix = deployed_fix("hotspot_congestion", 0.5, 10);
        store.insert(fix.clone()).await;

        let engine = engine(Arc::clone(&telemetry), Arc::clone(&store));
        let handle = {
            let engine = Arc::clone(&engine);
            let fix = fix.clone();
            tokio::spawn(async move { engine.verify_fix(&fix).await })
        };

        // Metric crosses after two seconds.
        tokio::time::sleep(Duration::from_secs(2)).await;
        telemetry.push("hotspot_congestion", 0.4).await;

        handle.await.unwrap().unwrap();
        assert_eq!(
            store.get(&fix.fix_id).await.unwrap().status,
            FixStatus::Verified
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_preempts_window() {
        let telemetry = Arc::new(InMemoryTelemetry::new());
        let store = Arc::new(FixStore::new());
        let fix = deployed_fix("hotspot_congestion", 0.5, 600);
        store.insert(fix.clone()).await;

        let engine = engine(telemetry, Arc::clone(&store));
        let handle = {
            let engine = Arc::clone(&engine);
            let fix = fix.clone();
            tokio::spawn(async move { engine.verify_fix(&fix).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        engine.cancel(&fix.fix_id).await;
        handle.await.unwrap().unwrap();

        // Cancelled verification leaves the fix state untouched.
        assert_eq!(
            store.get(&fix.fix_id).await.unwrap().status,
            FixStatus::DeploySucceeded
        );
    }
}
