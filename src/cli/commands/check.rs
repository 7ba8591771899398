//! `chronos check`: validate a scenario file without running the stack.

use anyhow::Result;
use clap::Args;

use crate::cli::scenario::Scenario;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Scenario file to validate (YAML)
    #[arg(long)]
    pub scenario: String,
}

pub async fn execute(args: CheckArgs, json_output: bool) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;

    if json_output {
        println!(
            "{}",
            serde_json::json!({
                "valid": true,
                "problems": scenario.problems.len(),
                "metrics": scenario.metrics.len(),
            })
        );
    } else {
        println!(
            "scenario ok: {} problem(s), {} metric injection(s)",
            scenario.problems.len(),
            scenario.metrics.len()
        );
    }
    Ok(())
}
