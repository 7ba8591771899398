//! Agentic strategy: task decomposition, specialized solvers, and merge.
//!
//! Not a single call but an orchestration over the bus. The splitter emits
//! typed sub-tasks, each routed to exactly one specialized solver; the
//! merger collects partial solutions and assembles the final one. A
//! problem with zero partials by the merge deadline falls back to rules.

pub mod merger;
pub mod solvers;
pub mod splitter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::rules::RulesStrategy;
use super::SolutionStrategy;
use crate::domain::errors::DomainResult;
use crate::domain::models::problem::{Problem, TrajectorySnapshot};
use crate::domain::models::solution::Solution;
use crate::services::event_bus::{EventBus, EventPayload, Topic};

pub use merger::PartialSolutionMerger;
pub use solvers::SpecialistSolver;

/// Provenance tag when the agentic mesh produced nothing and the rules
/// engine answered instead.
const FALLBACK_TAG: &str = "rules-engine (agentic-fallback)";

pub struct AgenticStrategy {
    bus: Arc<EventBus>,
    merger: Arc<PartialSolutionMerger>,
    fallback: RulesStrategy,
}

impl AgenticStrategy {
    /// The merger must already be running against the same bus; solvers
    /// are spawned separately (see [`solvers::spawn_all`]).
    pub fn new(bus: Arc<EventBus>, merger: Arc<PartialSolutionMerger>) -> Self {
        Self {
            bus,
            merger,
            fallback: RulesStrategy::new(),
        }
    }

    /// Convenience constructor that also spawns the merger loop and the
    /// solver pool on the given bus. Subscriptions are established before
    /// this returns.
    pub fn spawn(bus: Arc<EventBus>, merge_window: Duration) -> Self {
        let merger = Arc::new(PartialSolutionMerger::new(merge_window));
        tokio::spawn(Arc::clone(&merger).run(bus.subscribe()));
        solvers::spawn_all(&bus);
        Self::new(bus, merger)
    }

    async fn fall_back(
        &self,
        problem: &Problem,
        context: &TrajectorySnapshot,
        reason: &str,
    ) -> DomainResult<Solution> {
        warn!(
            problem_id = %problem.problem_id,
            reason,
            "agentic strategy produced nothing, falling back to rules"
        );
        let mut solution = self.fallback.generate(problem, context).await?;
        solution.generated_by = FALLBACK_TAG.to_string();
        Ok(solution)
    }
}

#[async_trait]
impl SolutionStrategy for AgenticStrategy {
    fn name(&self) -> &'static str {
        "agentic"
    }

    async fn generate(
        &self,
        problem: &Problem,
        context: &TrajectorySnapshot,
    ) -> DomainResult<Solution> {
        let tasks = splitter::split(problem);
        if tasks.is_empty() {
            return self.fall_back(problem, context, "no sub-tasks").await;
        }

        // Register the dispatched set before publishing, so no partial can
        // race ahead of its merge record.
        let expected: Vec<String> = tasks.iter().map(|t| t.task_id.clone()).collect();
        let rx = self.merger.register(&problem.problem_id, expected).await;

        for task in tasks {
            self.bus
                .publish(
                    Topic::for_subtask(task.kind),
                    crate::domain::models::problem::Severity::Info,
                    Some(problem.problem_id.clone()),
                    EventPayload::SubTask(task),
                )
                .await;
        }

        match rx.await {
            Ok(Some(solution)) => Ok(solution),
            Ok(None) => {
                self.fall_back(problem, context, "zero partials by merge deadline")
                    .await
            }
            Err(_) => self.fall_back(problem, context, "merger dropped").await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::problem::{Location, ProblemType, Severity};

    fn conflict() -> Problem {
        Problem::new(
            "CONF-001",
            ProblemType::Conflict,
            vec!["FLT-100".to_string(), "FLT-200".to_string()],
            Location::sector("airspace-sector-1"),
            Severity::Critical,
        )
    }

    #[tokio::test]
    async fn test_full_mesh_answers_conflict() {
        let bus = Arc::new(EventBus::new(256));
        let strategy = AgenticStrategy::spawn(Arc::clone(&bus), Duration::from_secs(5));

        let solution = strategy
            .generate(&conflict(), &TrajectorySnapshot::default())
            .await
            .unwrap();

        assert_eq!(solution.problem_id, "CONF-001");
        assert_eq!(solution.generated_by, "deconflict-agent");
        assert!((solution.confidence_score - 0.90).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_solvers_falls_back_to_rules() {
        let bus = Arc::new(EventBus::new(256));
        // Merger runs but no solvers are spawned: nothing will answer.
        let merger = Arc::new(PartialSolutionMerger::new(Duration::from_secs(2)));
        tokio::spawn(Arc::clone(&merger).run(bus.subscribe()));
        let strategy = AgenticStrategy::new(bus, merger);

        let solution = strategy
            .generate(&conflict(), &TrajectorySnapshot::default())
            .await
            .unwrap();

        assert_eq!(solution.generated_by, FALLBACK_TAG);
        assert_eq!(solution.proposed_actions.len(), 2);
    }
}
