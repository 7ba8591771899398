//! In-memory fix registry with single-writer discipline per fix.
//!
//! Lifecycle legality depends on strict transition order, so every mutation
//! of a fix record goes through a per-fix async mutex. Readers get clones.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::fix::Fix;

/// Shared fix registry.
#[derive(Default)]
pub struct FixStore {
    inner: RwLock<HashMap<String, Arc<Mutex<Fix>>>>,
}

impl FixStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly proposed fix.
    pub async fn insert(&self, fix: Fix) {
        let mut map = self.inner.write().await;
        map.insert(fix.fix_id.clone(), Arc::new(Mutex::new(fix)));
    }

    /// Snapshot of one fix.
    pub async fn get(&self, fix_id: &str) -> Option<Fix> {
        let entry = {
            let map = self.inner.read().await;
            map.get(fix_id).cloned()
        };
        match entry {
            Some(slot) => Some(slot.lock().await.clone()),
            None => None,
        }
    }

    /// Apply a mutation under the fix's writer lock and return a snapshot
    /// of the updated record.
    pub async fn update<F>(&self, fix_id: &str, mutate: F) -> DomainResult<Fix>
    where
        F: FnOnce(&mut Fix) -> DomainResult<()>,
    {
        let entry = {
            let map = self.inner.read().await;
            map.get(fix_id).cloned()
        };
        let slot = entry.ok_or_else(|| DomainError::FixNotFound(fix_id.to_string()))?;
        let mut fix = slot.lock().await;
        mutate(&mut fix)?;
        Ok(fix.clone())
    }

    /// Snapshot of every registered fix.
    pub async fn all(&self) -> Vec<Fix> {
        let slots: Vec<_> = {
            let map = self.inner.read().await;
            map.values().cloned().collect()
        };
        let mut fixes = Vec::with_capacity(slots.len());
        for slot in slots {
            fixes.push(slot.lock().await.clone());
        }
        fixes
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::fix::{FixStatus, RiskLevel, VerificationSpec};
    use crate::domain::models::problem::{Location, Problem, ProblemType, Severity};
    use crate::domain::models::solution::{
        ActionKind, ActionParameters, EstimatedImpact, ProposedAction, Solution, SolutionType,
    };

    fn make_fix() -> Fix {
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
                reasoning: "slow down".to_string(),
            }],
            estimated_impact: EstimatedImpact::default(),
            confidence_score: 0.85,
            generated_by: "rules-engine".to_string(),
            requires_approval: false,
        };
        Fix::from_solution(&solution, &problem, "test", |_| VerificationSpec {
            metric_name: "hotspot_congestion".to_string(),
            threshold: 0.5,
            window_seconds: 60,
        })
    }

    #[tokio::test]
    async fn test_insert_get_update() {
        let store = FixStore::new();
        let fix = make_fix();
        let fix_id = fix.fix_id.clone();
        assert_eq!(fix.risk_level, RiskLevel::Low);

        store.insert(fix).await;
        assert_eq!(store.len().await, 1);

        let updated = store
            .update(&fix_id, |f| f.transition_to(FixStatus::DeployRequested))
            .await
            .unwrap();
        assert_eq!(updated.status, FixStatus::DeployRequested);

        let fetched = store.get(&fix_id).await.unwrap();
        assert_eq!(fetched.status, FixStatus::DeployRequested);
    }

    #[tokio::test]
    async fn test_update_unknown_fix() {
        let store = FixStore::new();
        let err = store.update("FIX-NOPE", |_| Ok(())).await.unwrap_err();
        assert!(matches!(err, DomainError::FixNotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_mutation_preserves_state() {
        let store = FixStore::new();
        let fix = make_fix();
        let fix_id = fix.fix_id.clone();
        store.insert(fix).await;

        // Illegal transition: record must stay in its original state.
        let err = store
            .update(&fix_id, |f| f.transition_to(FixStatus::Verified))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
        assert_eq!(
            store.get(&fix_id).await.unwrap().status,
            FixStatus::Proposed
        );
    }
}
