//! Problem decomposition for the agentic strategy.

use crate::domain::models::problem::{Problem, ProblemType};
use crate::domain::models::solution::{SubTask, SubTaskKind};

/// Decompose one problem into typed sub-tasks, each with a fresh task id
/// carrying the parent problem id.
///
/// Conflicts that also cite a violated rule get a validation sub-task in
/// addition to deconfliction, so both specialists contribute partials.
pub fn split(problem: &Problem) -> Vec<SubTask> {
    let mut tasks = Vec::new();
    match problem.problem_type {
        ProblemType::Conflict => {
            tasks.push(SubTask::new(SubTaskKind::Deconflict, problem));
            if problem.details.rule.is_some() {
                tasks.push(SubTask::new(SubTaskKind::ValidationFix, problem));
            }
        }
        ProblemType::Hotspot => {
            tasks.push(SubTask::new(SubTaskKind::HotspotMitigation, problem));
        }
        ProblemType::Violation => {
            tasks.push(SubTask::new(SubTaskKind::ValidationFix, problem));
        }
    }
    tasks
}
