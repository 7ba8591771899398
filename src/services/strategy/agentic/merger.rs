//! Partial solution merger.
//!
//! Collects partial solutions per problem against an explicit dispatched
//! task set and deadline (not a transient "received N" trigger), merges
//! them into one solution, and answers the waiting strategy through a
//! oneshot channel. The merge is idempotent: a duplicated task id replaces
//! the earlier partial instead of double-counting actions or impact.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::solution::{PartialSolution, Solution, SolutionType};
use crate::services::event_bus::{BusEvent, EventPayload, Topic};

/// Why a merge record was finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeTrigger {
    /// Every dispatched task reported.
    AllReported,
    /// The merge window elapsed.
    Deadline,
}

/// Per-problem merge state: the counter and deadline live here, in the
/// record, so the decision is reconstructible rather than buried in timers.
struct MergeRecord {
    expected: Vec<String>,
    received: HashMap<String, PartialSolution>,
    responder: oneshot::Sender<Option<Solution>>,
}

impl MergeRecord {
    fn is_complete(&self) -> bool {
        self.expected.iter().all(|id| self.received.contains_key(id))
    }
}

/// Merger service shared between the agentic strategy (which registers
/// problems) and the bus loop (which feeds partials in).
pub struct PartialSolutionMerger {
    records: Arc<Mutex<HashMap<String, MergeRecord>>>,
    window: Duration,
}

impl PartialSolutionMerger {
    pub fn new(window: Duration) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            window,
        }
    }

    /// Register the dispatched task set for a problem and receive the
    /// merged solution (or `None` when nothing arrived by the deadline).
    pub async fn register(
        &self,
        problem_id: &str,
        expected_task_ids: Vec<String>,
    ) -> oneshot::Receiver<Option<Solution>> {
        let (tx, rx) = oneshot::channel();
        {
            let mut records = self.records.lock().await;
            records.insert(
                problem_id.to_string(),
                MergeRecord {
                    expected: expected_task_ids,
                    received: HashMap::new(),
                    responder: tx,
                },
            );
        }

        // Deadline watchdog; a no-op if the record completed first.
        let records = Arc::clone(&self.records);
        let problem_id = problem_id.to_string();
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            Self::finalize(&records, &problem_id, MergeTrigger::Deadline).await;
        });

        rx
    }

    /// Feed one partial solution in. Unknown problems are ignored (the
    /// record may already have been finalized).
    pub async fn accept(&self, partial: PartialSolution) {
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(&partial.problem_id) else {
            debug!(
                task_id = %partial.task_id,
                problem_id = %partial.problem_id,
                "partial for unknown or finalized problem, ignoring"
            );
            return;
        };

        if !record.expected.contains(&partial.task_id) {
            warn!(
                task_id = %partial.task_id,
                problem_id = %partial.problem_id,
                "partial for undispatched task, ignoring"
            );
            return;
        }

        // Idempotent by task id.
        record.received.insert(partial.task_id.clone(), partial);
    }

    /// Feed a partial and finalize immediately if it completed the set.
    async fn accept_and_check(&self, partial: PartialSolution) {
        let problem_id = partial.problem_id.clone();
        self.accept(partial).await;
        let complete = {
            let records = self.records.lock().await;
            records
                .get(&problem_id)
                .is_some_and(MergeRecord::is_complete)
        };
        if complete {
            Self::finalize(&self.records, &problem_id, MergeTrigger::AllReported).await;
        }
    }

    /// Close out a merge record and answer the waiting strategy.
    async fn finalize(
        records: &Mutex<HashMap<String, MergeRecord>>,
        problem_id: &str,
        trigger: MergeTrigger,
    ) {
        let record = {
            let mut records = records.lock().await;
            records.remove(problem_id)
        };
        let Some(record) = record else {
            return; // Already finalized by the other trigger.
        };

        if trigger == MergeTrigger::Deadline && !record.is_complete() {
            let err = DomainError::MergeTimeout {
                problem_id: problem_id.to_string(),
                received: record.received.len(),
                expected: record.expected.len(),
            };
            warn!("{err}; merging available partials");
        }

        let merged = merge(problem_id, &record.expected, record.received);
        match &merged {
            Some(solution) => info!(
                problem_id,
                solution_id = %solution.solution_id,
                generated_by = %solution.generated_by,
                "partials merged"
            ),
            None => warn!(problem_id, "no partial solutions received by deadline"),
        }
        let _ = record.responder.send(merged);
    }

    /// Bus loop: feed `task.partial_solution` events into the merger.
    ///
    /// Takes a receiver created by the caller before spawning, so no
    /// partial published in the meantime is missed.
    pub async fn run(
        self: Arc<Self>,
        mut rx: tokio::sync::broadcast::Receiver<BusEvent>,
    ) {
        loop {
            match rx.recv().await {
                Ok(BusEvent {
                    topic: Topic::TaskPartialSolution,
                    payload: EventPayload::Partial(partial),
                    ..
                }) => {
                    self.accept_and_check(partial).await;
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "merger lagged behind the bus");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// Merge received partials into one solution. `None` when nothing arrived.
///
/// Actions concatenate in dispatch order, entities union preserving first
/// occurrence, total delay sums, and confidence is the arithmetic mean of
/// the received partials.
fn merge(
    problem_id: &str,
    expected: &[String],
    mut received: HashMap<String, PartialSolution>,
) -> Option<Solution> {
    if received.is_empty() {
        return None;
    }

    let partials: Vec<PartialSolution> = expected
        .iter()
        .filter_map(|task_id| received.remove(task_id))
        .collect();

    let mut proposed_actions = Vec::new();
    let mut affected_entities: Vec<String> = Vec::new();
    let mut total_delay_minutes = 0.0;
    let mut delay_reduction = 0.0;
    let mut risk_score_delta = 0.0;
    let mut area_affected: f64 = 0.0;
    let mut agent_names: Vec<String> = Vec::new();

    for partial in &partials {
        proposed_actions.extend(partial.proposed_actions.iter().cloned());
        for entity in &partial.affected_entities {
            if !affected_entities.contains(entity) {
                affected_entities.push(entity.clone());
            }
        }
        total_delay_minutes += partial.estimated_impact.total_delay_minutes;
        delay_reduction += partial.estimated_impact.delay_reduction;
        risk_score_delta += partial.estimated_impact.risk_score_delta;
        area_affected = area_affected.max(partial.estimated_impact.area_affected);
        if !agent_names.contains(&partial.agent_name) {
            agent_names.push(partial.agent_name.clone());
        }
    }

    let confidence_score = partials
        .iter()
        .map(|p| p.confidence_score)
        .sum::<f64>()
        / partials.len() as f64;

    let solution_type = if partials.len() > 1 {
        SolutionType::MultiAction
    } else {
        partials[0].solution_type
    };

    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    Some(Solution {
        solution_id: format!("SOL-MERGED-{suffix}"),
        solution_type,
        problem_id: problem_id.to_string(),
        affected_entities,
        proposed_actions,
        estimated_impact: crate::domain::models::solution::EstimatedImpact {
            total_delay_minutes,
            delay_reduction,
            risk_score_delta,
            area_affected,
        },
        confidence_score,
        generated_by: agent_names.join(","),
        requires_approval: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::solution::{
        ActionKind, ActionParameters, EstimatedImpact, ProposedAction,
    };

    fn partial(task_id: &str, agent: &str, confidence: f64, delay: f64) -> PartialSolution {
        PartialSolution {
            task_id: task_id.to_string(),
            problem_id: "CONF-001".to_string(),
            solution_type: SolutionType::AltitudeChange,
            affected_entities: vec!["FLT-1".to_string()],
            proposed_actions: vec![ProposedAction {
                entity_id: "FLT-1".to_string(),
                action_kind: ActionKind::AltitudeChange,
                parameters: ActionParameters {
                    new_altitude_ft: Some(37_000.0),
                    delay_minutes: Some(delay),
                    ..Default::default()
                },
                reasoning: "climb".to_string(),
            }],
            estimated_impact: EstimatedImpact {
                total_delay_minutes: delay,
                delay_reduction: 4.0,
                risk_score_delta: -0.1,
                area_affected: 10.0,
            },
            confidence_score: confidence,
            agent_name: agent.to_string(),
        }
    }

    #[test]
    fn test_merge_two_partials() {
        let mut received = HashMap::new();
        received.insert("T1".to_string(), partial("T1", "deconflict-agent", 0.9, 0.0));
        received.insert("T2".to_string(), partial("T2", "validation-agent", 0.8, 3.0));

        let merged = merge(
            "CONF-001",
            &["T1".to_string(), "T2".to_string()],
            received,
        )
        .unwrap();

        assert_eq!(merged.solution_type, SolutionType::MultiAction);
        assert_eq!(merged.proposed_actions.len(), 2);
        // Union, not concat: both partials touch FLT-1.
        assert_eq!(merged.affected_entities, vec!["FLT-1".to_string()]);
        assert!((merged.confidence_score - 0.85).abs() < 1e-9);
        assert!((merged.estimated_impact.total_delay_minutes - 3.0).abs() < 1e-9);
        assert_eq!(merged.generated_by, "deconflict-agent,validation-agent");
    }

    #[test]
    fn test_merge_single_partial_keeps_its_shape() {
        let mut received = HashMap::new();
        received.insert("T1".to_string(), partial("T1", "deconflict-agent", 0.9, 0.0));

        let merged = merge(
            "CONF-001",
            &["T1".to_string(), "T2".to_string()],
            received,
        )
        .unwrap();

        assert_eq!(merged.solution_type, SolutionType::AltitudeChange);
        assert!((merged.confidence_score - 0.9).abs() < 1e-9);
        assert_eq!(merged.generated_by, "deconflict-agent");
    }

    #[test]
    fn test_merge_nothing_is_none() {
        assert!(merge("CONF-001", &["T1".to_string()], HashMap::new()).is_none());
    }

    #[tokio::test]
    async fn test_duplicate_task_id_does_not_double_count() {
        let merger = Arc::new(PartialSolutionMerger::new(Duration::from_secs(30)));
        let rx = merger
            .register("CONF-001", vec!["T1".to_string(), "T2".to_string()])
            .await;

        merger
            .accept_and_check(partial("T1", "deconflict-agent", 0.9, 0.0))
            .await;
        // Duplicate delivery of the same task id.
        merger
            .accept_and_check(partial("T1", "deconflict-agent", 0.9, 0.0))
            .await;
        merger
            .accept_and_check(partial("T2", "validation-agent", 0.8, 3.0))
            .await;

        let merged = rx.await.unwrap().unwrap();
        assert_eq!(merged.proposed_actions.len(), 2);
        assert!((merged.estimated_impact.total_delay_minutes - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_out_of_order_partials_merge_in_dispatch_order() {
        let merger = Arc::new(PartialSolutionMerger::new(Duration::from_secs(30)));
        let rx = merger
            .register("CONF-001", vec!["T1".to_string(), "T2".to_string()])
            .await;

        // T2 arrives first.
        merger
            .accept_and_check(partial("T2", "validation-agent", 0.8, 3.0))
            .await;
        merger
            .accept_and_check(partial("T1", "deconflict-agent", 0.9, 0.0))
            .await;

        let merged = rx.await.unwrap().unwrap();
        assert_eq!(merged.generated_by, "deconflict-agent,validation-agent");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_merges_available_partials() {
        let merger = Arc::new(PartialSolutionMerger::new(Duration::from_secs(5)));
        let rx = merger
            .register("CONF-001", vec!["T1".to_string(), "T2".to_string()])
            .await;

        merger
            .accept_and_check(partial("T1", "deconflict-agent", 0.9, 0.0))
            .await;

        // Only the deadline can resolve the pending record now.
        let merged = rx.await.unwrap().unwrap();
        assert_eq!(merged.generated_by, "deconflict-agent");
        assert!((merged.confidence_score - 0.9).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_with_no_partials_yields_none() {
        let merger = Arc::new(PartialSolutionMerger::new(Duration::from_secs(5)));
        let rx = merger.register("CONF-001", vec!["T1".to_string()]).await;
        assert!(rx.await.unwrap().is_none());
    }
}
