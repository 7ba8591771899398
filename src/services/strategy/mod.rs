//! Solution strategies.
//!
//! One pluggable contract, three implementations: deterministic rules,
//! single-call LLM generation, and agentic task decomposition with merge.
//! The mode is fixed at construction time; the only sanctioned runtime
//! deviation is the documented LLM -> rules fallback.

pub mod agentic;
pub mod llm;
pub mod rules;

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::problem::{Problem, TrajectorySnapshot};
use crate::domain::models::solution::Solution;

pub use agentic::AgenticStrategy;
pub use llm::LlmStrategy;
pub use rules::RulesStrategy;

/// Pluggable solution generator.
#[async_trait]
pub trait SolutionStrategy: Send + Sync {
    /// Strategy tag recorded in `generated_by` provenance.
    fn name(&self) -> &'static str;

    /// Produce a candidate remediation for one problem.
    ///
    /// Implementations never surface backend failures to the caller: every
    /// recoverable error degrades to the rules fallback, so the returned
    /// solution is always valid.
    async fn generate(
        &self,
        problem: &Problem,
        context: &TrajectorySnapshot,
    ) -> DomainResult<Solution>;
}
