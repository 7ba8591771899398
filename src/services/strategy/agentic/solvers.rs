//! Specialized solvers for agentic sub-tasks.
//!
//! Each solver subscribes to exactly one task topic and publishes a
//! partial solution correlated by task id. They run as independent bus
//! services; the merger assembles their output.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::models::problem::Severity;
use crate::domain::models::solution::{
    ActionKind, ActionParameters, EstimatedImpact, PartialSolution, ProposedAction, SolutionType,
    SubTask, SubTaskKind,
};
use crate::services::event_bus::{EventBus, EventPayload, Topic};

/// Altitude/speed assumptions when no live track is available to a solver.
const ASSUMED_ALTITUDE_FT: f64 = 35_000.0;
const ASSUMED_SPEED_KN: f64 = 450.0;

/// One specialized in-process solver.
///
/// Subscribes at construction time so no task published after `new`
/// returns can be missed.
pub struct SpecialistSolver {
    bus: Arc<EventBus>,
    kind: SubTaskKind,
    rx: tokio::sync::broadcast::Receiver<crate::services::event_bus::BusEvent>,
}

impl SpecialistSolver {
    pub fn new(bus: Arc<EventBus>, kind: SubTaskKind) -> Self {
        let rx = bus.subscribe();
        Self { bus, kind, rx }
    }

    pub fn agent_name(kind: SubTaskKind) -> &'static str {
        match kind {
            SubTaskKind::Deconflict => "deconflict-agent",
            SubTaskKind::HotspotMitigation => "hotspot-agent",
            SubTaskKind::ValidationFix => "validation-agent",
        }
    }

    /// Answer sub-tasks until the bus closes.
    pub async fn run(mut self) {
        let topic = Topic::for_subtask(self.kind);
        info!(agent = Self::agent_name(self.kind), %topic, "solver subscribed");

        loop {
            match self.rx.recv().await {
                Ok(event) if event.topic == topic => {
                    if let EventPayload::SubTask(task) = event.payload {
                        self.handle_task(task).await;
                    }
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(
                        agent = Self::agent_name(self.kind),
                        missed, "solver lagged behind the bus"
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn handle_task(&self, task: SubTask) {
        debug!(
            agent = Self::agent_name(self.kind),
            task_id = %task.task_id,
            problem_id = %task.problem_id,
            "solving sub-task"
        );

        let Some(partial) = solve(self.kind, &task) else {
            warn!(
                agent = Self::agent_name(self.kind),
                task_id = %task.task_id,
                "sub-task not solvable, no partial published"
            );
            return;
        };

        self.bus
            .publish(
                Topic::TaskPartialSolution,
                Severity::Info,
                Some(task.problem_id.clone()),
                EventPayload::Partial(partial),
            )
            .await;
    }
}

/// Compute one partial solution for a sub-task. Pure; exposed for tests.
pub fn solve(kind: SubTaskKind, task: &SubTask) -> Option<PartialSolution> {
    match kind {
        SubTaskKind::Deconflict => deconflict(task),
        SubTaskKind::HotspotMitigation => hotspot_mitigation(task),
        SubTaskKind::ValidationFix => validation_fix(task),
    }
}

/// Vertical separation: climb the first entity of the pair.
fn deconflict(task: &SubTask) -> Option<PartialSolution> {
    let entity = task.problem.affected_entities.first()?.clone();
    Some(PartialSolution {
        task_id: task.task_id.clone(),
        problem_id: task.problem_id.clone(),
        solution_type: SolutionType::AltitudeChange,
        affected_entities: vec![entity.clone()],
        proposed_actions: vec![ProposedAction {
            entity_id: entity,
            action_kind: ActionKind::AltitudeChange,
            parameters: ActionParameters {
                new_altitude_ft: Some(ASSUMED_ALTITUDE_FT + 2000.0),
                ..Default::default()
            },
            reasoning: "Increase altitude to create vertical separation".to_string(),
        }],
        estimated_impact: EstimatedImpact {
            total_delay_minutes: 0.0,
            delay_reduction: 8.0,
            risk_score_delta: -0.3,
            area_affected: 20.0,
        },
        confidence_score: 0.90,
        agent_name: SpecialistSolver::agent_name(SubTaskKind::Deconflict).to_string(),
    })
}

/// Flow metering: slow the first three entities through the hotspot.
fn hotspot_mitigation(task: &SubTask) -> Option<PartialSolution> {
    let entities: Vec<String> = task
        .problem
        .affected_entities
        .iter()
        .take(3)
        .cloned()
        .collect();
    if entities.is_empty() {
        return None;
    }

    let actions: Vec<ProposedAction> = entities
        .iter()
        .map(|entity| ProposedAction {
            entity_id: entity.clone(),
            action_kind: ActionKind::SpeedChange,
            parameters: ActionParameters {
                speed_change_kn: Some(-20.0),
                new_speed_kn: Some(ASSUMED_SPEED_KN - 20.0),
                delay_minutes: Some(2.0),
                ..Default::default()
            },
            reasoning: "Reduce speed to decrease hotspot density".to_string(),
        })
        .collect();

    let total_delay_minutes = actions.iter().map(ProposedAction::delay_minutes).sum();
    Some(PartialSolution {
        task_id: task.task_id.clone(),
        problem_id: task.problem_id.clone(),
        solution_type: SolutionType::SpeedAdjustment,
        affected_entities: entities,
        proposed_actions: actions,
        estimated_impact: EstimatedImpact {
            total_delay_minutes,
            delay_reduction: 5.0,
            risk_score_delta: -0.2,
            area_affected: 30.0,
        },
        confidence_score: 0.88,
        agent_name: SpecialistSolver::agent_name(SubTaskKind::HotspotMitigation).to_string(),
    })
}

/// Compliance: reroute every involved entity around the restriction.
fn validation_fix(task: &SubTask) -> Option<PartialSolution> {
    if task.problem.affected_entities.is_empty() {
        return None;
    }
    let waypoint = format!("{}-AVOID", task.problem.location.sector_id.to_uppercase());
    let actions: Vec<ProposedAction> = task
        .problem
        .affected_entities
        .iter()
        .map(|entity| ProposedAction {
            entity_id: entity.clone(),
            action_kind: ActionKind::Reroute,
            parameters: ActionParameters {
                new_waypoints: vec![waypoint.clone()],
                delay_minutes: Some(3.0),
                ..Default::default()
            },
            reasoning: format!(
                "Reroute around restriction {}",
                task.problem.details.rule.as_deref().unwrap_or("unknown")
            ),
        })
        .collect();

    let total_delay_minutes = actions.iter().map(ProposedAction::delay_minutes).sum();
    Some(PartialSolution {
        task_id: task.task_id.clone(),
        problem_id: task.problem_id.clone(),
        solution_type: SolutionType::Reroute,
        affected_entities: task.problem.affected_entities.clone(),
        proposed_actions: actions,
        estimated_impact: EstimatedImpact {
            total_delay_minutes,
            delay_reduction: 2.0,
            risk_score_delta: -0.1,
            area_affected: 15.0,
        },
        confidence_score: 0.82,
        agent_name: SpecialistSolver::agent_name(SubTaskKind::ValidationFix).to_string(),
    })
}

/// Spawn the full solver pool. One solver per task kind.
pub fn spawn_all(bus: &Arc<EventBus>) -> Vec<JoinHandle<()>> {
    [
        SubTaskKind::Deconflict,
        SubTaskKind::HotspotMitigation,
        SubTaskKind::ValidationFix,
    ]
    .into_iter()
    .map(|kind| {
        let solver = SpecialistSolver::new(Arc::clone(bus), kind);
        tokio::spawn(solver.run())
    })
    .collect()
}
