//! Command-line interface.

pub mod commands;
pub mod scenario;

use clap::{Parser, Subcommand};

pub use commands::check::CheckArgs;
pub use commands::run::{CoreRuntime, RunArgs};

#[derive(Debug, Parser)]
#[command(
    name = "chronos",
    about = "Incident remediation core: strategies, fix lifecycle, verification",
    version
)]
pub struct Cli {
    /// Emit machine-readable JSON instead of human-oriented output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the coordination core, optionally replaying a scenario
    Run(RunArgs),
    /// Validate a scenario file
    Check(CheckArgs),
}

/// Print an error in the requested output format and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_output: bool) {
    if json_output {
        eprintln!("{}", serde_json::json!({ "error": format!("{err:#}") }));
    } else {
        eprintln!("error: {err:#}");
    }
    std::process::exit(1);
}
