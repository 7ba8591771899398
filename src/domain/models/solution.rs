//! Solution domain model.
//!
//! A Solution is one strategy's candidate remediation for a Problem.
//! Solutions are created once and never mutated; superseding a solution
//! means generating a new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::problem::Problem;

/// Overall shape of a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionType {
    Reroute,
    AltitudeChange,
    SpeedAdjustment,
    DepartureShift,
    MultiAction,
}

impl SolutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reroute => "reroute",
            Self::AltitudeChange => "altitude_change",
            Self::SpeedAdjustment => "speed_adjustment",
            Self::DepartureShift => "departure_shift",
            Self::MultiAction => "multi_action",
        }
    }
}

impl std::fmt::Display for SolutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of a single proposed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AltitudeChange,
    SpeedChange,
    DepartureShift,
    Reroute,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AltitudeChange => "altitude_change",
            Self::SpeedChange => "speed_change",
            Self::DepartureShift => "departure_shift",
            Self::Reroute => "reroute",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameters for a proposed action. Which fields are set depends on the
/// action kind; unset fields are omitted from serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_altitude_ft: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_change_kn: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_speed_kn: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_waypoints: Vec<String>,
}

/// One remedial action applied to one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    pub entity_id: String,
    pub action_kind: ActionKind,
    #[serde(default)]
    pub parameters: ActionParameters,
    pub reasoning: String,
}

impl ProposedAction {
    /// Delay contributed by this action, in minutes.
    pub fn delay_minutes(&self) -> f64 {
        self.parameters.delay_minutes.unwrap_or(0.0)
    }
}

/// Estimated operational impact of applying a solution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatedImpact {
    pub total_delay_minutes: f64,
    /// Expected reduction in average delay once applied, in minutes.
    pub delay_reduction: f64,
    /// Expected change in the area risk score (negative is improvement).
    pub risk_score_delta: f64,
    /// Affected area in square nautical miles.
    pub area_affected: f64,
}

/// A candidate remediation produced by one strategy invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub solution_id: String,
    pub solution_type: SolutionType,
    /// Back-reference to the originating problem (not ownership).
    pub problem_id: String,
    pub affected_entities: Vec<String>,
    pub proposed_actions: Vec<ProposedAction>,
    pub estimated_impact: EstimatedImpact,
    /// Strategy confidence in [0, 1].
    pub confidence_score: f64,
    /// Strategy tag, or contributing agent names for merged solutions.
    pub generated_by: String,
    pub requires_approval: bool,
}

impl Solution {
    /// Structural checks shared by all strategies. The LLM strategy uses
    /// this to reject malformed model output before it enters the pipeline.
    pub fn validate(&self) -> Result<(), String> {
        if self.solution_id.trim().is_empty() {
            return Err("solution_id cannot be empty".to_string());
        }
        if self.proposed_actions.is_empty() {
            return Err("solution must propose at least one action".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(format!(
                "confidence_score {} outside [0, 1]",
                self.confidence_score
            ));
        }
        Ok(())
    }
}

/// Kind of sub-task dispatched to a specialized solver in agentic mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskKind {
    Deconflict,
    HotspotMitigation,
    ValidationFix,
}

impl SubTaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deconflict => "deconflict",
            Self::HotspotMitigation => "hotspot_mitigation",
            Self::ValidationFix => "validation_fix",
        }
    }
}

impl std::fmt::Display for SubTaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed sub-task carved out of one problem by the agentic splitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    pub task_id: String,
    /// Parent problem this sub-task belongs to.
    pub problem_id: String,
    pub kind: SubTaskKind,
    pub problem: Problem,
    pub created_at: DateTime<Utc>,
}

impl SubTask {
    pub fn new(kind: SubTaskKind, problem: &Problem) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        let prefix = match kind {
            SubTaskKind::Deconflict => "TASK-DECONF",
            SubTaskKind::HotspotMitigation => "TASK-HOTSPOT",
            SubTaskKind::ValidationFix => "TASK-VALFIX",
        };
        Self {
            task_id: format!("{prefix}-{suffix}"),
            problem_id: problem.problem_id.clone(),
            kind,
            problem: problem.clone(),
            created_at: Utc::now(),
        }
    }
}

/// One specialized solver's contribution, correlated by `task_id` and
/// merged with the other partials before becoming a Fix candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialSolution {
    pub task_id: String,
    pub problem_id: String,
    pub solution_type: SolutionType,
    pub affected_entities: Vec<String>,
    pub proposed_actions: Vec<ProposedAction>,
    pub estimated_impact: EstimatedImpact,
    pub confidence_score: f64,
    pub agent_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::problem::{Location, ProblemType, Severity};

    fn minimal_solution() -> Solution {
        Solution {
            solution_id: "SOL-TEST-1".to_string(),
            solution_type: SolutionType::SpeedAdjustment,
            problem_id: "HOT-001".to_string(),
            affected_entities: vec!["FLT-100".to_string()],
            proposed_actions: vec![ProposedAction {
                entity_id: "FLT-100".to_string(),
                action_kind: ActionKind::SpeedChange,
                parameters: ActionParameters {
                    speed_change_kn: Some(-20.0),
                    new_speed_kn: Some(430.0),
                    delay_minutes: Some(2.0),
                    ..Default::default()
                },
                reasoning: "Reduce speed to decrease hotspot density".to_string(),
            }],
            estimated_impact: EstimatedImpact::default(),
            confidence_score: 0.85,
            generated_by: "rules-engine".to_string(),
            requires_approval: false,
        }
    }

    #[test]
    fn test_solution_validation() {
        assert!(minimal_solution().validate().is_ok());

        let mut s = minimal_solution();
        s.proposed_actions.clear();
        assert!(s.validate().is_err());

        let mut s = minimal_solution();
        s.confidence_score = 1.2;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_subtask_ids_carry_parent_problem() {
        let problem = Problem::new(
            "CONF-007",
            ProblemType::Conflict,
            vec!["FLT-1".to_string(), "FLT-2".to_string()],
            Location::sector("sector-9"),
            Severity::Warning,
        );

        let task = SubTask::new(SubTaskKind::Deconflict, &problem);
        assert!(task.task_id.starts_with("TASK-DECONF-"));
        assert_eq!(task.problem_id, "CONF-007");

        // Fresh id per sub-task
        let other = SubTask::new(SubTaskKind::Deconflict, &problem);
        assert_ne!(task.task_id, other.task_id);
    }

    #[test]
    fn test_action_parameters_omit_unset_fields() {
        let action = ProposedAction {
            entity_id: "FLT-100".to_string(),
            action_kind: ActionKind::AltitudeChange,
            parameters: ActionParameters {
                new_altitude_ft: Some(37_000.0),
                ..Default::default()
            },
            reasoning: "climb".to_string(),
        };

        let json = serde_json::to_value(&action).unwrap();
        let params = json.get("parameters").unwrap();
        assert!(params.get("new_altitude_ft").is_some());
        assert!(params.get("speed_change_kn").is_none());
        assert!(params.get("new_waypoints").is_none());
    }
}
