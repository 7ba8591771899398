//! Fix domain model and lifecycle state machine.
//!
//! A Fix is the governed, auditable wrapper around a Solution chosen for
//! execution. It is created exactly once at proposal time and is
//! append-only thereafter: every transition adds fields, none are deleted,
//! so the record doubles as its own audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::problem::{Problem, Severity};
use super::solution::{EstimatedImpact, ProposedAction, Solution};
use crate::domain::errors::{DomainError, DomainResult};

/// Lifecycle states of a fix.
///
/// The legal edges are encoded in [`FixStatus::valid_transitions`]; anything
/// else is rejected with `InvalidTransition` and leaves the record untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStatus {
    Proposed,
    ReviewRequired,
    Approved,
    Rejected,
    DeployRequested,
    DeployStarted,
    DeploySucceeded,
    DeployFailed,
    Verified,
    VerificationFailed,
    Stable,
    RollbackRequested,
    RollbackSucceeded,
}

impl Default for FixStatus {
    fn default() -> Self {
        Self::Proposed
    }
}

impl FixStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::ReviewRequired => "review_required",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::DeployRequested => "deploy_requested",
            Self::DeployStarted => "deploy_started",
            Self::DeploySucceeded => "deploy_succeeded",
            Self::DeployFailed => "deploy_failed",
            Self::Verified => "verified",
            Self::VerificationFailed => "verification_failed",
            Self::Stable => "stable",
            Self::RollbackRequested => "rollback_requested",
            Self::RollbackSucceeded => "rollback_succeeded",
        }
    }

    /// Valid transitions from this status.
    ///
    /// `Proposed -> DeployRequested` is the autonomous path, taken only for
    /// low-risk fixes that do not require human approval.
    pub fn valid_transitions(&self) -> Vec<FixStatus> {
        match self {
            Self::Proposed => vec![Self::ReviewRequired, Self::DeployRequested],
            Self::ReviewRequired => vec![Self::Approved, Self::Rejected],
            Self::Approved => vec![Self::DeployRequested],
            Self::Rejected => vec![],
            Self::DeployRequested => vec![Self::DeployStarted],
            Self::DeployStarted => vec![Self::DeploySucceeded, Self::DeployFailed],
            Self::DeploySucceeded => vec![Self::Verified, Self::VerificationFailed],
            Self::DeployFailed => vec![],
            Self::Verified => vec![Self::Stable, Self::RollbackRequested],
            Self::VerificationFailed => vec![Self::RollbackRequested],
            // An operator may flag a fix any time after verification.
            Self::Stable => vec![Self::RollbackRequested],
            Self::RollbackRequested => vec![Self::RollbackSucceeded],
            Self::RollbackSucceeded => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }

    /// A state with no outgoing edges.
    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Whether a review decision has already been made.
    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Proposed | Self::ReviewRequired)
    }
}

impl std::fmt::Display for FixStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operational risk of deploying a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Med,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Med => "med",
            Self::High => "high",
        }
    }

    /// Risk classification used when wrapping a solution into a fix:
    /// driven by problem severity, bumped for multi-entity reroutes.
    pub fn classify(problem: &Problem, solution: &Solution) -> Self {
        let base = match problem.severity {
            Severity::Critical => Self::High,
            Severity::Error | Severity::Warning => Self::Med,
            Severity::Info => Self::Low,
        };
        let has_reroute = solution
            .proposed_actions
            .iter()
            .any(|a| matches!(a.action_kind, super::solution::ActionKind::Reroute));
        if has_reroute && base == Self::Med {
            Self::High
        } else {
            base
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction in which a metric must move to count as improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricDirection {
    LowerIsBetter,
    HigherIsBetter,
}

/// Success criterion for one deployed action: the named telemetry metric
/// must cross the threshold favorably within the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationSpec {
    pub metric_name: String,
    pub threshold: f64,
    pub window_seconds: u64,
}

impl VerificationSpec {
    /// Infer the favorable direction from metric semantics.
    ///
    /// Name table: delay/congestion/risk/density/load move down when things
    /// improve; separation/voltage/headway/throughput move up. Unknown
    /// metrics default to lower-is-better, matching the dominant delay-style
    /// metrics in this domain.
    pub fn direction(&self) -> MetricDirection {
        let name = self.metric_name.to_lowercase();
        const HIGHER: [&str; 4] = ["separation", "voltage", "headway", "throughput"];
        if HIGHER.iter().any(|kw| name.contains(kw)) {
            MetricDirection::HigherIsBetter
        } else {
            MetricDirection::LowerIsBetter
        }
    }

    /// Whether a sampled value satisfies this criterion.
    pub fn is_satisfied_by(&self, value: f64) -> bool {
        match self.direction() {
            MetricDirection::LowerIsBetter => value <= self.threshold,
            MetricDirection::HigherIsBetter => value >= self.threshold,
        }
    }
}

/// One action of a fix, carrying its verification criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixAction {
    #[serde(flatten)]
    pub action: ProposedAction,
    pub verification: VerificationSpec,
}

/// The governed wrapper around a solution chosen for execution.
///
/// Serialized field names are the wire contract: every lifecycle event
/// carries this full record, so any subscriber can reconstruct current
/// state from the latest event alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// Stable identifier, independent of `correlation_id`.
    pub fix_id: String,
    /// The originating problem's identifier.
    pub correlation_id: String,
    /// Strategy tag of the generating strategy.
    pub source: String,
    pub title: String,
    pub summary: String,
    pub actions: Vec<FixAction>,
    pub risk_level: RiskLevel,
    pub expected_impact: EstimatedImpact,
    pub created_at: DateTime<Utc>,
    pub proposed_by: String,
    pub requires_human_approval: bool,
    pub status: FixStatus,

    // Lifecycle-appended fields. Set once, never cleared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_reason: Option<String>,
}

impl Fix {
    /// Wrap a solution into a new fix record in the `Proposed` state.
    pub fn from_solution(
        solution: &Solution,
        problem: &Problem,
        proposed_by: impl Into<String>,
        default_verification: impl Fn(&ProposedAction) -> VerificationSpec,
    ) -> Self {
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        let actions = solution
            .proposed_actions
            .iter()
            .map(|action| FixAction {
                verification: default_verification(action),
                action: action.clone(),
            })
            .collect();

        Self {
            fix_id: format!("FIX-{suffix}"),
            correlation_id: problem.problem_id.clone(),
            source: solution.generated_by.clone(),
            title: format!(
                "{} remediation for {}",
                capitalize(problem.problem_type.as_str()),
                problem.problem_id
            ),
            summary: format!(
                "{} proposed {} action(s) for {} in {} (severity {})",
                solution.generated_by,
                solution.proposed_actions.len(),
                problem.problem_id,
                problem.location.sector_id,
                problem.severity,
            ),
            actions,
            risk_level: RiskLevel::classify(problem, solution),
            expected_impact: solution.estimated_impact.clone(),
            created_at: Utc::now(),
            proposed_by: proposed_by.into(),
            requires_human_approval: solution.requires_approval,
            status: FixStatus::Proposed,
            review_notes: None,
            approved_by: None,
            deployed_at: None,
            verified_at: None,
            rollback_reason: None,
        }
    }

    pub fn can_transition_to(&self, new_status: FixStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Apply a lifecycle transition, enforcing the state graph.
    ///
    /// On an illegal edge the record is left untouched and the caller gets
    /// `InvalidTransition`; the fix stays in exactly one well-defined state.
    pub fn transition_to(&mut self, new_status: FixStatus) -> DomainResult<()> {
        if new_status == FixStatus::Approved && self.requires_human_approval {
            let approved = self.approved_by.as_deref().is_some_and(|by| !by.is_empty());
            if !approved {
                return Err(DomainError::InvalidTransition {
                    fix_id: self.fix_id.clone(),
                    from: self.status.as_str().to_string(),
                    to: new_status.as_str().to_string(),
                    reason: "approval requires a non-empty approved_by".to_string(),
                });
            }
        }

        if !self.can_transition_to(new_status) {
            return Err(DomainError::InvalidTransition {
                fix_id: self.fix_id.clone(),
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
                reason: "not a legal edge in the lifecycle graph".to_string(),
            });
        }

        self.status = new_status;
        match new_status {
            FixStatus::DeploySucceeded => self.deployed_at = Some(Utc::now()),
            FixStatus::Verified => self.verified_at = Some(Utc::now()),
            _ => {}
        }
        Ok(())
    }

    /// Append a note to `review_notes` without erasing earlier ones.
    pub fn append_review_note(&mut self, note: impl AsRef<str>) {
        match &mut self.review_notes {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(note.as_ref());
            }
            None => self.review_notes = Some(note.as_ref().to_string()),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
