//! Single-call LLM strategy.
//!
//! Serializes the problem and the relevant trajectory summary into a
//! bounded prompt, demands a strict-JSON response matching the solution
//! schema, and validates the parse. On transport error, parse failure, or
//! schema violation it falls back to the rules strategy and tags the
//! provenance; the caller never receives a strategy-specific error.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::rules::RulesStrategy;
use super::SolutionStrategy;
use crate::domain::errors::DomainResult;
use crate::domain::models::problem::{Problem, TrajectorySnapshot};
use crate::domain::models::solution::{
    EstimatedImpact, ProposedAction, Solution, SolutionType,
};
use crate::domain::ports::llm_client::{CompletionRequest, LlmClient};
use std::sync::Arc;

/// Provenance tag applied when the model could not produce a usable
/// solution and the rules engine answered instead.
const FALLBACK_TAG: &str = "rules-engine (llm-fallback)";

/// Schema the model must return. Strict: unknown fields are rejected so a
/// drifting model contract fails fast into the fallback path.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LlmSolutionDraft {
    solution_type: SolutionType,
    affected_entities: Vec<String>,
    proposed_actions: Vec<ProposedAction>,
    estimated_impact: EstimatedImpact,
    confidence_score: f64,
    requires_approval: bool,
}

pub struct LlmStrategy {
    client: Arc<dyn LlmClient>,
    fallback: RulesStrategy,
    max_tokens: u32,
    temperature: f32,
}

impl LlmStrategy {
    pub fn new(client: Arc<dyn LlmClient>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            client,
            fallback: RulesStrategy::new(),
            max_tokens,
            temperature,
        }
    }

    /// Build the bounded prompt: the problem plus only the tracks of the
    /// affected entities.
    fn build_prompt(problem: &Problem, context: &TrajectorySnapshot) -> String {
        let situation = serde_json::json!({
            "problem": problem,
            "trajectories": context.restricted_to(&problem.affected_entities).tracks,
        });

        format!(
            r#"You are an air traffic and transit remediation assistant. Analyze the
detected problem and propose a remediation.

Return ONLY valid JSON, no other text. Use this exact structure:

{{
  "solution_type": "reroute|altitude_change|speed_adjustment|departure_shift|multi_action",
  "affected_entities": ["FLT-XXX"],
  "proposed_actions": [
    {{
      "entity_id": "FLT-XXX",
      "action_kind": "altitude_change|speed_change|departure_shift|reroute",
      "parameters": {{
        "new_altitude_ft": 37000,
        "speed_change_kn": -15,
        "new_speed_kn": 435,
        "delay_minutes": 5,
        "new_waypoints": ["WP1"]
      }},
      "reasoning": "Brief explanation"
    }}
  ],
  "estimated_impact": {{
    "total_delay_minutes": 5.0,
    "delay_reduction": 8.0,
    "risk_score_delta": -0.3,
    "area_affected": 25.0
  }},
  "confidence_score": 0.8,
  "requires_approval": true
}}

Include only the parameter fields relevant to each action kind. Prioritize
safety and minimize delays.

Situation:
{situation}"#,
            situation = serde_json::to_string_pretty(&situation).unwrap_or_default()
        )
    }

    /// Pull a JSON object out of the completion text, tolerating code
    /// fences and prose around it.
    fn extract_json(text: &str) -> Option<&str> {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        (end > start).then(|| &text[start..=end])
    }

    fn parse_draft(text: &str) -> Result<LlmSolutionDraft, String> {
        let json = Self::extract_json(text).ok_or("no JSON object in completion")?;
        serde_json::from_str::<LlmSolutionDraft>(json).map_err(|e| e.to_string())
    }

    fn into_solution(&self, draft: LlmSolutionDraft, problem: &Problem) -> Solution {
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        Solution {
            solution_id: format!("SOL-LLM-{suffix}"),
            solution_type: draft.solution_type,
            problem_id: problem.problem_id.clone(),
            affected_entities: draft.affected_entities,
            proposed_actions: draft.proposed_actions,
            estimated_impact: draft.estimated_impact,
            confidence_score: draft.confidence_score,
            generated_by: format!("llm-{}", self.client.backend_id()),
            requires_approval: draft.requires_approval,
        }
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
            "LLM strategy unavailable, falling back to rules"
        );
        let mut solution = self.fallback.generate(problem, context).await?;
        solution.generated_by = FALLBACK_TAG.to_string();
        Ok(solution)
    }
}

#[async_trait]
impl SolutionStrategy for LlmStrategy {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn generate(
        &self,
        problem: &Problem,
        context: &TrajectorySnapshot,
    ) -> DomainResult<Solution> {
        let request = CompletionRequest {
            prompt: Self::build_prompt(problem, context),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let text = match self.client.complete(request).await {
            Ok(text) => text,
            Err(err) => return self.fall_back(problem, context, &err.to_string()).await,
        };

        let draft = match Self::parse_draft(&text) {
            Ok(draft) => draft,
            Err(err) => {
                debug!(completion = %text, "unparseable LLM completion");
                return self
                    .fall_back(problem, context, &format!("parse failure: {err}"))
                    .await;
            }
        };

        let solution = self.into_solution(draft, problem);
        if let Err(err) = solution.validate() {
            return self
                .fall_back(problem, context, &format!("invalid solution: {err}"))
                .await;
        }
        Ok(solution)
    }
}
