//! Chronos CLI entry point.

use clap::Parser;

use chronos::cli::{Cli, Commands};
use chronos::infrastructure::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging configuration comes from the same hierarchy the core uses;
    // fall back to defaults if the config itself is broken so the error
    // is still visible.
    let logging = ConfigLoader::load()
        .map(|c| c.logging)
        .unwrap_or_default();
    let _log_guard = chronos::infrastructure::logging::init(&logging);

    let result = match cli.command {
        Commands::Run(args) => chronos::cli::commands::run::execute(args, cli.json).await,
        Commands::Check(args) => chronos::cli::commands::check::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        chronos::cli::handle_error(err, cli.json);
    }
}
