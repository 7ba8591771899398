//! Scenario files: replayable synthetic incidents for the demo runner.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::models::problem::Problem;

/// A problem injected after a delay from scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioProblem {
    #[serde(default)]
    pub after_secs: u64,
    #[serde(flatten)]
    pub problem: Problem,
}

/// A telemetry sample injected after a delay from scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioMetric {
    #[serde(default)]
    pub after_secs: u64,
    pub metric_name: String,
    pub value: f64,
}

/// A replayable incident script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub problems: Vec<ScenarioProblem>,
    #[serde(default)]
    pub metrics: Vec<ScenarioMetric>,
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse scenario file {}", path.display()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if self.problems.is_empty() {
            anyhow::bail!("scenario contains no problems");
        }
        for entry in &self.problems {
            entry
                .problem
                .validate()
                .map_err(|reason| anyhow::anyhow!(
                    "invalid problem {}: {reason}",
                    entry.problem.problem_id
                ))?;
        }
        Ok(())
    }
}
