//! Fix coordinator.
//!
//! Consumes detected problems, runs the configured strategy, wraps the
//! resulting solution into a fix record, and owns every lifecycle
//! transition up to deployment hand-off. Also exposes the review surface
//! (approve/hold/dismiss) used by the review UI and applies the same verbs
//! when they arrive as `human.decision` events.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::config::{CoordinatorConfig, VerificationConfig};
use crate::domain::models::fix::{Fix, FixStatus, RiskLevel, VerificationSpec};
use crate::domain::models::problem::{Problem, Severity, TrajectorySnapshot};
use crate::domain::models::solution::{ActionKind, ProposedAction, Solution};
use crate::services::event_bus::{
    BusEvent, EventBus, EventPayload, ReviewDecision, ReviewVerb, Topic,
};
use crate::services::fix_store::FixStore;
use crate::services::strategy::SolutionStrategy;

/// Outcome of a review-surface call, serialized back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DecisionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

pub struct FixCoordinator {
    config: CoordinatorConfig,
    verification: VerificationConfig,
    bus: Arc<EventBus>,
    store: Arc<FixStore>,
    strategy: Arc<dyn SolutionStrategy>,
    snapshot: Arc<RwLock<TrajectorySnapshot>>,
}

impl FixCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        verification: VerificationConfig,
        bus: Arc<EventBus>,
        store: Arc<FixStore>,
        strategy: Arc<dyn SolutionStrategy>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            verification,
            bus,
            store,
            strategy,
            snapshot: Arc::new(RwLock::new(TrajectorySnapshot::default())),
        })
    }

    /// Event loop. Each problem is handled in its own task so a slow
    /// strategy (e.g. an agentic merge window) never blocks the bus.
    pub async fn run(self: Arc<Self>, mut rx: broadcast::Receiver<BusEvent>) {
        info!(strategy = self.strategy.name(), "fix coordinator running");
        loop {
            match rx.recv().await {
                Ok(event) => match (event.topic, event.payload) {
                    (
                        Topic::ConflictDetected
                        | Topic::HotspotDetected
                        | Topic::ValidationViolation,
                        EventPayload::Problem(problem),
                    ) => {
                        let coordinator = Arc::clone(&self);
                        tokio::spawn(async move {
                            coordinator.handle_problem(problem).await;
                        });
                    }
                    (Topic::TrajectorySampled, EventPayload::Track(track)) => {
                        self.snapshot.write().await.upsert(track);
                    }
                    (Topic::HumanDecision, EventPayload::Decision(decision)) => {
                        let result = self.apply_decision(&decision).await;
                        if !result.success {
                            warn!(
                                fix_id = %decision.fix_id,
                                verb = ?decision.verb,
                                error = result.error.as_deref().unwrap_or("unknown"),
                                "decision rejected"
                            );
                        }
                    }
                    (Topic::FixVerified, EventPayload::Fix(fix)) => {
                        if fix.status == FixStatus::Verified {
                            Self::schedule_stability_promotion(Arc::clone(&self), fix.fix_id);
                        }
                    }
                    _ => {}
                },
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "coordinator lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Generate a solution for one problem and carry it into the lifecycle.
    async fn handle_problem(&self, problem: Problem) {
        if let Err(reason) = problem.validate() {
            warn!(problem_id = %problem.problem_id, %reason, "dropping malformed problem");
            return;
        }

        info!(
            problem_id = %problem.problem_id,
            problem_type = %problem.problem_type,
            severity = %problem.severity,
            "problem received"
        );

        let context = self.snapshot.read().await.clone();
        let solution = match self.strategy.generate(&problem, &context).await {
            Ok(solution) => solution,
            Err(err) => {
                // Strategies degrade internally; reaching here means even
                // the rules fallback failed, which leaves nothing to do.
                error!(problem_id = %problem.problem_id, %err, "solution generation failed");
                return;
            }
        };

        self.bus
            .publish(
                Topic::SolutionProposed,
                Severity::Info,
                Some(problem.problem_id.clone()),
                EventPayload::Solution(solution.clone()),
            )
            .await;

        if let Err(err) = self.propose_fix(&solution, &problem).await {
            error!(problem_id = %problem.problem_id, %err, "failed to propose fix");
        }
    }

    /// Wrap a solution into a fix, publish `fix.proposed`, and route it to
    /// review or straight to deployment.
    pub async fn propose_fix(&self, solution: &Solution, problem: &Problem) -> DomainResult<Fix> {
        let window = self.verification.default_window_seconds;
        let fix = Fix::from_solution(solution, problem, self.config.proposed_by.clone(), |a| {
            default_verification_spec(a, problem, window)
        });
        let fix_id = fix.fix_id.clone();

        self.store.insert(fix.clone()).await;
        self.bus.publish_fix(&fix).await;
        info!(
            %fix_id,
            correlation_id = %fix.correlation_id,
            risk_level = %fix.risk_level,
            "fix proposed"
        );

        let autonomous = self.config.auto_deploy_low_risk
            && !fix.requires_human_approval
            && fix.risk_level == RiskLevel::Low;

        let routed = if autonomous {
            self.transition(&fix_id, FixStatus::DeployRequested, |_| Ok(()))
                .await?
        } else {
            self.transition(&fix_id, FixStatus::ReviewRequired, |_| Ok(()))
                .await?
        };
        Ok(routed)
    }

    /// Apply a transition under the per-fix lock and publish the full
    /// record on success.
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

    /// Review surface: approve a fix. Idempotent — a repeat decision on an
    /// already-decided fix re-emits the existing record and succeeds.
    pub async fn approve(&self, fix_id: &str, approved_by: &str) -> DecisionResult {
        if approved_by.trim().is_empty() {
            return DecisionResult::failed("approved_by cannot be empty");
        }

        match self.store.get(fix_id).await {
            None => return DecisionResult::failed(format!("fix not found: {fix_id}")),
            Some(fix) if fix.status.is_decided() => {
                // Duplicate click: re-emit, do not re-transition.
                self.bus.publish_fix(&fix).await;
                return DecisionResult::ok();
            }
            Some(_) => {}
        }

        let approved_by = approved_by.to_string();
        let result = self
            .transition(fix_id, FixStatus::Approved, move |f| {
                f.approved_by = Some(approved_by);
                Ok(())
            })
            .await;

        match result {
            Ok(_) => {
                // Approval immediately requests deployment; the deployer
                // takes over from there.
                match self
                    .transition(fix_id, FixStatus::DeployRequested, |_| Ok(()))
                    .await
                {
                    Ok(_) => DecisionResult::ok(),
                    Err(err) => DecisionResult::failed(err.to_string()),
                }
            }
            Err(err) => DecisionResult::failed(err.to_string()),
        }
    }

    /// Review surface: hold a fix in review. No transition; the
    /// `review_required` state can persist indefinitely.
    pub async fn hold(&self, fix_id: &str) -> DecisionResult {
        match self.store.get(fix_id).await {
            None => DecisionResult::failed(format!("fix not found: {fix_id}")),
            Some(fix) if fix.status == FixStatus::ReviewRequired => {
                debug!(%fix_id, "fix held in review");
                DecisionResult::ok()
            }
            Some(fix) => DecisionResult::failed(format!(
                "cannot hold fix in state {}",
                fix.status.as_str()
            )),
        }
    }

    /// Review surface: dismiss (reject) a fix with a reason.
    pub async fn dismiss(&self, fix_id: &str, reason: &str) -> DecisionResult {
        match self.store.get(fix_id).await {
            None => return DecisionResult::failed(format!("fix not found: {fix_id}")),
            Some(fix) if fix.status.is_decided() => {
                self.bus.publish_fix(&fix).await;
                return DecisionResult::ok();
            }
            Some(_) => {}
        }

        let note = format!("rejected: {reason}");
        let result = self
            .transition(fix_id, FixStatus::Rejected, move |f| {
                f.append_review_note(note);
                Ok(())
            })
            .await;

        match result {
            Ok(_) => DecisionResult::ok(),
            Err(err) => DecisionResult::failed(err.to_string()),
        }
    }

    /// Operator signal: flag a verified fix for rollback.
    pub async fn request_rollback(&self, fix_id: &str, reason: &str) -> DecisionResult {
        let reason = reason.to_string();
        let result = self
            .transition(fix_id, FixStatus::RollbackRequested, move |f| {
                if f.rollback_reason.is_none() {
                    f.rollback_reason = Some(reason);
                }
                Ok(())
            })
            .await;
        match result {
            Ok(_) => DecisionResult::ok(),
            Err(err) => DecisionResult::failed(err.to_string()),
        }
    }

    /// Apply a decision event arriving over the bus.
    pub async fn apply_decision(&self, decision: &ReviewDecision) -> DecisionResult {
        match decision.verb {
            ReviewVerb::Approve => self.approve(&decision.fix_id, &decision.reviewer).await,
            ReviewVerb::Hold => self.hold(&decision.fix_id).await,
            ReviewVerb::Dismiss | ReviewVerb::Reject => {
                self.dismiss(
                    &decision.fix_id,
                    decision.reason.as_deref().unwrap_or("no reason given"),
                )
                .await
            }
            ReviewVerb::Rollback => {
                self.request_rollback(
                    &decision.fix_id,
                    decision.reason.as_deref().unwrap_or("operator request"),
                )
                .await
            }
        }
    }

    /// Promote `verified -> stable` after the policy window, unless a
    /// rollback request got there first (the transition then simply fails
    /// its legality check and nothing changes).
    fn schedule_stability_promotion(coordinator: Arc<Self>, fix_id: String) {
        let delay = Duration::from_secs(coordinator.config.stable_after_secs);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match coordinator
                .transition(&fix_id, FixStatus::Stable, |_| Ok(()))
                .await
            {
                Ok(_) => info!(%fix_id, "fix promoted to stable"),
                Err(DomainError::InvalidTransition { .. }) => {
                    debug!(%fix_id, "stability promotion pre-empted");
                }
                Err(err) => warn!(%fix_id, %err, "stability promotion failed"),
            }
        });
    }

    pub fn store(&self) -> Arc<FixStore> {
        Arc::clone(&self.store)
    }
}

/// Default verification criteria per action kind, parameterized by the
/// problem where the detector supplied thresholds.
fn default_verification_spec(
    action: &ProposedAction,
    problem: &Problem,
    window_seconds: u64,
) -> VerificationSpec {
    match action.action_kind {
        ActionKind::AltitudeChange => VerificationSpec {
            metric_name: "minimum_separation_nm".to_string(),
            threshold: problem.details.required_separation_nm.unwrap_or(5.0),
            window_seconds,
        },
        ActionKind::SpeedChange => VerificationSpec {
            metric_name: "hotspot_congestion".to_string(),
            threshold: 0.5,
            window_seconds,
        },
        ActionKind::DepartureShift => VerificationSpec {
            metric_name: "average_delay_minutes".to_string(),
            threshold: 10.0,
            window_seconds,
        },
        ActionKind::Reroute => VerificationSpec {
            metric_name: "risk_score".to_string(),
            threshold: 0.4,
            window_seconds,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::problem::{Location, ProblemType};
    use crate::services::strategy::RulesStrategy;

    fn coordinator(auto_deploy: bool) -> Arc<FixCoordinator> {
        let bus = Arc::new(EventBus::new(256));
        let store = Arc::new(FixStore::new());
        FixCoordinator::new(
            CoordinatorConfig {
                auto_deploy_low_risk: auto_deploy,
                ..Default::default()
            },
            VerificationConfig::default(),
            bus,
            store,
            Arc::new(RulesStrategy::new()),
        )
    }

    fn conflict() -> Problem {
        Problem::new(
            "CONF-001",
            ProblemType::Conflict,
            vec!["FLT-100".to_string(), "FLT-200".to_string()],
            Location::sector("airspace-sector-1"),
            Severity::Critical,
        )
    }

    fn hotspot() -> Problem {
        Problem::new(
            "HOT-001",
            ProblemType::Hotspot,
            vec!["FLT-300".to_string()],
            Location::sector("airspace-sector-2"),
            Severity::Info,
        )
    }

    async fn propose(coordinator: &Arc<FixCoordinator>, problem: &Problem) -> Fix {
        let solution = RulesStrategy::new()
            .generate(problem, &TrajectorySnapshot::default())
            .await
            .unwrap();
        coordinator.propose_fix(&solution, problem).await.unwrap()
    }

    #[tokio::test]
    async fn test_high_risk_fix_routes_to_review() {
        let coordinator = coordinator(true);
        let fix = propose(&coordinator, &conflict()).await;
        assert_eq!(fix.status, FixStatus::ReviewRequired);
        assert!(fix.requires_human_approval);
        assert_eq!(fix.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_low_risk_fix_auto_deploys() {
        let coordinator = coordinator(true);
        let fix = propose(&coordinator, &hotspot()).await;
        assert_eq!(fix.status, FixStatus::DeployRequested);
    }

    #[tokio::test]
    async fn test_auto_deploy_disabled_routes_to_review() {
        let coordinator = coordinator(false);
        let fix = propose(&coordinator, &hotspot()).await;
        assert_eq!(fix.status, FixStatus::ReviewRequired);
    }

    #[tokio::test]
    async fn test_approve_requires_reviewer() {
        let coordinator = coordinator(true);
        let fix = propose(&coordinator, &conflict()).await;

        let result = coordinator.approve(&fix.fix_id, "  ").await;
        assert!(!result.success);

        let result = coordinator.approve(&fix.fix_id, "op-1").await;
        assert!(result.success);
        let fix = coordinator.store().get(&fix.fix_id).await.unwrap();
        assert_eq!(fix.status, FixStatus::DeployRequested);
        assert_eq!(fix.approved_by.as_deref(), Some("op-1"));
    }

    #[tokio::test]
    async fn test_duplicate_approval_is_noop() {
        let coordinator = coordinator(true);
        let fix = propose(&coordinator, &conflict()).await;

        assert!(coordinator.approve(&fix.fix_id, "op-1").await.success);
        let after_first = coordinator.store().get(&fix.fix_id).await.unwrap();

        // Second click: succeeds, changes nothing.
        assert!(coordinator.approve(&fix.fix_id, "op-2").await.success);
        let after_second = coordinator.store().get(&fix.fix_id).await.unwrap();
        assert_eq!(after_first.status, after_second.status);
        assert_eq!(after_second.approved_by.as_deref(), Some("op-1"));
    }

    #[tokio::test]
    async fn test_dismiss_records_reason_and_is_terminal() {
        let coordinator = coordinator(true);
        let fix = propose(&coordinator, &conflict()).await;

        let result = coordinator.dismiss(&fix.fix_id, "unsafe").await;
        assert!(result.success);

        let fix = coordinator.store().get(&fix.fix_id).await.unwrap();
        assert_eq!(fix.status, FixStatus::Rejected);
        assert_eq!(fix.review_notes.as_deref(), Some("rejected: unsafe"));

        // A rejected fix can never reach deployment.
        let result = coordinator.approve(&fix.fix_id, "op-1").await;
        assert!(result.success); // idempotent re-emit
        assert_eq!(
            coordinator.store().get(&fix.fix_id).await.unwrap().status,
            FixStatus::Rejected
        );
    }

    #[tokio::test]
    async fn test_hold_keeps_review_state() {
        let coordinator = coordinator(true);
        let fix = propose(&coordinator, &conflict()).await;

        assert!(coordinator.hold(&fix.fix_id).await.success);
        assert_eq!(
            coordinator.store().get(&fix.fix_id).await.unwrap().status,
            FixStatus::ReviewRequired
        );
    }

    #[tokio::test]
    async fn test_decision_on_unknown_fix_fails() {
        let coordinator = coordinator(true);
        let result = coordinator.approve("FIX-NOPE", "op-1").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_rollback_requires_post_verification_state() {
        let coordinator = coordinator(true);
        let fix = propose(&coordinator, &conflict()).await;
        let result = coordinator.request_rollback(&fix.fix_id, "flagged").await;
        assert!(!result.success);
    }
}
