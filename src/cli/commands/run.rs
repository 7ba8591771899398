//! `chronos run`: wire the full coordination stack and optionally replay
//! a scenario of synthetic incidents through it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::cli::scenario::Scenario;
use crate::domain::models::config::{Config, StrategyMode};
use crate::domain::models::problem::{ProblemType, Severity};
use crate::domain::ports::telemetry::MetricSample;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::event_store::InMemoryEventStore;
use crate::infrastructure::llm::HttpLlmClient;
use crate::infrastructure::sandbox::SimulatedSandbox;
use crate::infrastructure::telemetry::InMemoryTelemetry;
use crate::services::coordinator::FixCoordinator;
use crate::services::deployer::Deployer;
use crate::services::event_bus::{EventBus, EventPayload, Topic};
use crate::services::fix_store::FixStore;
use crate::services::rollback::RollbackHandler;
use crate::services::strategy::{
    AgenticStrategy, LlmStrategy, RulesStrategy, SolutionStrategy,
};
use crate::services::verifier::VerificationEngine;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Strategy mode override (RULES, LLM, AGENTIC)
    #[arg(long, env = "CHRONOS_MODE")]
    pub mode: Option<String>,

    /// Scenario file to replay (YAML)
    #[arg(long)]
    pub scenario: Option<String>,

    /// Stop after this many seconds (runs until Ctrl-C when unset)
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Configuration file (defaults to .chronos/config.yaml hierarchy)
    #[arg(long)]
    pub config: Option<String>,
}

pub async fn execute(args: RunArgs, json_output: bool) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(mode) = &args.mode {
        config.mode = StrategyMode::from_str(mode)
            .with_context(|| format!("unknown mode {mode}, expected RULES, LLM or AGENTIC"))?;
    }

    let scenario = args
        .scenario
        .as_deref()
        .map(Scenario::load)
        .transpose()?;

    info!(mode = %config.mode, "starting chronos core");
    let runtime = CoreRuntime::start(&config)?;

    // Stream every bus event to stdout for observers.
    let mut event_rx = runtime.bus.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            let line = if json_output {
                serde_json::to_string(&event).unwrap_or_default()
            } else {
                format!(
                    "[{}] seq={} topic={} correlation={}",
                    event.timestamp.format("%H:%M:%S%.3f"),
                    event.sequence.0,
                    event.topic,
                    event.correlation_id.as_deref().unwrap_or("-")
                )
            };
            println!("{line}");
        }
    });

    if let Some(scenario) = scenario {
        inject_scenario(Arc::clone(&runtime.bus), scenario);
    }

    match args.duration_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for shutdown signal")?;
            info!("shutdown signal received");
        }
    }

    printer.abort();
    Ok(())
}

/// The wired coordination stack.
pub struct CoreRuntime {
    pub bus: Arc<EventBus>,
    pub store: Arc<FixStore>,
    pub coordinator: Arc<FixCoordinator>,
    pub verifier: Arc<VerificationEngine>,
    pub telemetry: Arc<InMemoryTelemetry>,
    pub sandbox: Arc<SimulatedSandbox>,
}

impl CoreRuntime {
    /// Build and spawn every service against one bus.
    pub fn start(config: &Config) -> Result<Self> {
        let store_backend = Arc::new(InMemoryEventStore::new());
        let bus = Arc::new(if config.bus.persist_events {
            EventBus::new(config.bus.channel_capacity).with_store(store_backend)
        } else {
            EventBus::new(config.bus.channel_capacity)
        });

        let strategy = build_strategy(config, &bus)?;
        let store = Arc::new(FixStore::new());
        let telemetry = Arc::new(InMemoryTelemetry::new());
        let sandbox = Arc::new(SimulatedSandbox::new());

        let coordinator = FixCoordinator::new(
            config.coordinator.clone(),
            config.verification.clone(),
            Arc::clone(&bus),
            Arc::clone(&store),
            strategy,
        );
        let deployer = Deployer::new(Arc::clone(&bus), Arc::clone(&store), sandbox.clone());
        let rollback = RollbackHandler::new(Arc::clone(&bus), Arc::clone(&store), sandbox.clone());
        let verifier = VerificationEngine::new(
            config.verification.clone(),
            Arc::clone(&bus),
            Arc::clone(&store),
            telemetry.clone(),
        );

        // Subscribe every service before returning so no early event is lost.
        tokio::spawn(Arc::clone(&telemetry).run(bus.subscribe()));
        tokio::spawn(Arc::clone(&coordinator).run(bus.subscribe()));
        tokio::spawn(Arc::clone(&deployer).run(bus.subscribe()));
        tokio::spawn(Arc::clone(&rollback).run(bus.subscribe()));
        tokio::spawn(Arc::clone(&verifier).run(bus.subscribe()));

        Ok(Self {
            bus,
            store,
            coordinator,
            verifier,
            telemetry,
            sandbox,
        })
    }
}

/// Resolve the configured strategy once, at startup.
fn build_strategy(config: &Config, bus: &Arc<EventBus>) -> Result<Arc<dyn SolutionStrategy>> {
    Ok(match config.mode {
        StrategyMode::Rules => Arc::new(RulesStrategy::new()),
        StrategyMode::Llm => {
            let client = HttpLlmClient::new(config.llm.clone())
                .context("LLM mode requires a configured backend (set CHRONOS_LLM__API_KEY)")?;
            Arc::new(LlmStrategy::new(
                Arc::new(client),
                config.llm.max_tokens,
                config.llm.temperature,
            ))
        }
        StrategyMode::Agentic => Arc::new(AgenticStrategy::spawn(
            Arc::clone(bus),
            Duration::from_secs(config.merge.window_secs),
        )),
    })
}

/// Replay a scenario against the bus on its own timeline.
fn inject_scenario(bus: Arc<EventBus>, scenario: Scenario) {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now();
        let mut problems = scenario.problems;
        let mut metrics = scenario.metrics;
        problems.sort_by_key(|p| p.after_secs);
        metrics.sort_by_key(|m| m.after_secs);

        let mut problems = problems.into_iter().peekable();
        let mut metrics = metrics.into_iter().peekable();

        loop {
            let next_problem = problems.peek().map(|p| p.after_secs);
            let next_metric = metrics.peek().map(|m| m.after_secs);
            let Some(next_at) = [next_problem, next_metric].into_iter().flatten().min()
            else {
                break;
            };

            tokio::time::sleep_until(start + Duration::from_secs(next_at)).await;

            while problems.peek().is_some_and(|p| p.after_secs <= next_at) {
                let entry = problems.next().unwrap();
                let topic = match entry.problem.problem_type {
                    ProblemType::Conflict => Topic::ConflictDetected,
                    ProblemType::Hotspot => Topic::HotspotDetected,
                    ProblemType::Violation => Topic::ValidationViolation,
                };
                info!(problem_id = %entry.problem.problem_id, "injecting scenario problem");
                bus.publish(
                    topic,
                    entry.problem.severity,
                    Some(entry.problem.problem_id.clone()),
                    EventPayload::Problem(entry.problem),
                )
                .await;
            }

            while metrics.peek().is_some_and(|m| m.after_secs <= next_at) {
                let entry = metrics.next().unwrap();
                bus.publish(
                    Topic::TelemetryMetric,
                    Severity::Info,
                    None,
                    EventPayload::Metric(MetricSample::now(entry.metric_name, entry.value)),
                )
                .await;
            }
        }
        info!("scenario replay complete");
    });
}
