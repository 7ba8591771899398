//! Deterministic rules strategy.
//!
//! A heuristic table keyed by problem type. No I/O, no randomness: the
//! same problem and snapshot always yield the same solution, including the
//! solution id, which is derived from the problem id. This is the
//! universal fallback for every other strategy.

use async_trait::async_trait;

use super::SolutionStrategy;
use crate::domain::errors::DomainResult;
use crate::domain::models::problem::{Problem, ProblemType, TrajectorySnapshot};
use crate::domain::models::solution::{
    ActionKind, ActionParameters, EstimatedImpact, ProposedAction, Solution, SolutionType,
};

/// Altitude assigned when an entity has no track in the snapshot.
const DEFAULT_ALTITUDE_FT: f64 = 35_000.0;
/// Speed assigned when an entity has no track in the snapshot.
const DEFAULT_SPEED_KN: f64 = 450.0;
/// Ceiling for altitude-change proposals (FL410).
const MAX_ALTITUDE_FT: f64 = 41_000.0;
/// Floor for speed-change proposals.
const MIN_SPEED_KN: f64 = 300.0;
/// Fixed confidence for all rules-generated solutions.
const RULES_CONFIDENCE: f64 = 0.85;
/// How many hotspot entities get metered.
const HOTSPOT_METERED_ENTITIES: usize = 3;

pub struct RulesStrategy;

impl RulesStrategy {
    pub fn new() -> Self {
        Self
    }

    fn altitude_of(context: &TrajectorySnapshot, entity_id: &str) -> f64 {
        context
            .track(entity_id)
            .and_then(|t| t.altitude_ft)
            .unwrap_or(DEFAULT_ALTITUDE_FT)
    }

    fn speed_of(context: &TrajectorySnapshot, entity_id: &str) -> f64 {
        context
            .track(entity_id)
            .and_then(|t| t.speed_kn)
            .unwrap_or(DEFAULT_SPEED_KN)
    }

    fn conflict_actions(problem: &Problem, context: &TrajectorySnapshot) -> Vec<ProposedAction> {
        let mut actions = Vec::new();
        let entities = &problem.affected_entities;
        if entities.len() < 2 {
            // Degenerate single-entity conflict: meter the one entity.
            if let Some(entity) = entities.first() {
                let speed = Self::speed_of(context, entity);
                actions.push(ProposedAction {
                    entity_id: entity.clone(),
                    action_kind: ActionKind::SpeedChange,
                    parameters: ActionParameters {
                        speed_change_kn: Some(-15.0),
                        new_speed_kn: Some((speed - 15.0).max(MIN_SPEED_KN)),
                        ..Default::default()
                    },
                    reasoning: "Reduce speed to create temporal separation".to_string(),
                });
            }
            return actions;
        }

        // First entity climbs, second slows.
        let altitude = Self::altitude_of(context, &entities[0]);
        actions.push(ProposedAction {
            entity_id: entities[0].clone(),
            action_kind: ActionKind::AltitudeChange,
            parameters: ActionParameters {
                new_altitude_ft: Some((altitude + 2000.0).min(MAX_ALTITUDE_FT)),
                ..Default::default()
            },
            reasoning: "Increase altitude to create vertical separation".to_string(),
        });

        let speed = Self::speed_of(context, &entities[1]);
        actions.push(ProposedAction {
            entity_id: entities[1].clone(),
            action_kind: ActionKind::SpeedChange,
            parameters: ActionParameters {
                speed_change_kn: Some(-15.0),
                new_speed_kn: Some((speed - 15.0).max(MIN_SPEED_KN)),
                ..Default::default()
            },
            reasoning: "Reduce speed to create temporal separation".to_string(),
        });

        // Time-window conflicts additionally shift the first departure.
        if problem.details.conflict_time.is_some() {
            actions.push(ProposedAction {
                entity_id: entities[0].clone(),
                action_kind: ActionKind::DepartureShift,
                parameters: ActionParameters {
                    delay_minutes: Some(5.0),
                    ..Default::default()
                },
                reasoning: "Shift departure time to avoid conflict window".to_string(),
            });
        }

        actions
    }

    fn hotspot_actions(problem: &Problem, context: &TrajectorySnapshot) -> Vec<ProposedAction> {
        problem
            .affected_entities
            .iter()
            .take(HOTSPOT_METERED_ENTITIES)
            .map(|entity| {
                let speed = Self::speed_of(context, entity);
                ProposedAction {
                    entity_id: entity.clone(),
                    action_kind: ActionKind::SpeedChange,
                    parameters: ActionParameters {
                        speed_change_kn: Some(-20.0),
                        new_speed_kn: Some((speed - 20.0).max(MIN_SPEED_KN)),
                        delay_minutes: Some(2.0),
                        ..Default::default()
                    },
                    reasoning: "Reduce speed to decrease hotspot density".to_string(),
                }
            })
            .collect()
    }

    fn violation_actions(problem: &Problem) -> Vec<ProposedAction> {
        // Deterministic avoidance waypoint derived from the sector id.
        let waypoint = format!("{}-AVOID", problem.location.sector_id.to_uppercase());
        problem
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
                    problem.details.rule.as_deref().unwrap_or("unknown")
                ),
            })
            .collect()
    }

    fn impact_for(problem: &Problem, actions: &[ProposedAction]) -> EstimatedImpact {
        let total_delay_minutes: f64 = actions.iter().map(ProposedAction::delay_minutes).sum();
        let (delay_reduction, risk_score_delta) = match problem.problem_type {
            ProblemType::Conflict => (8.0, -0.3),
            ProblemType::Hotspot => (5.0, -0.2),
            ProblemType::Violation => (2.0, -0.1),
        };
        EstimatedImpact {
            total_delay_minutes,
            delay_reduction,
            risk_score_delta,
            area_affected: 25.0,
        }
    }
}

impl Default for RulesStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SolutionStrategy for RulesStrategy {
    fn name(&self) -> &'static str {
        "rules-engine"
    }

    async fn generate(
        &self,
        problem: &Problem,
        context: &TrajectorySnapshot,
    ) -> DomainResult<Solution> {
        let (actions, solution_type, requires_approval) = match problem.problem_type {
            ProblemType::Conflict => (
                Self::conflict_actions(problem, context),
                SolutionType::MultiAction,
                true,
            ),
            ProblemType::Hotspot => (
                Self::hotspot_actions(problem, context),
                SolutionType::SpeedAdjustment,
                false,
            ),
            ProblemType::Violation => (
                Self::violation_actions(problem),
                SolutionType::Reroute,
                true,
            ),
        };

        let affected_entities: Vec<String> = actions
            .iter()
            .map(|a| a.entity_id.clone())
            .fold(Vec::new(), |mut acc, id| {
                if !acc.contains(&id) {
                    acc.push(id);
                }
                acc
            });

        let estimated_impact = Self::impact_for(problem, &actions);

        Ok(Solution {
            // Deterministic id: identical input yields an identical solution.
            solution_id: format!("SOL-RULES-{}", problem.problem_id),
            solution_type,
            problem_id: problem.problem_id.clone(),
            affected_entities,
            proposed_actions: actions,
            estimated_impact,
            confidence_score: RULES_CONFIDENCE,
            generated_by: self.name().to_string(),
            requires_approval,
        })
    }
}
