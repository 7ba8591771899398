//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chronos::cli::CoreRuntime;
use chronos::domain::models::config::{
    Config, CoordinatorConfig, MergeConfig, StrategyMode, VerificationConfig,
};
use chronos::domain::models::fix::{Fix, FixStatus};
use chronos::domain::models::problem::{Location, Problem, ProblemType, Severity};
use chronos::services::event_bus::{BusEvent, EventBus, EventPayload, Topic};
use chronos::services::fix_store::FixStore;

/// Config with short windows so tests run quickly under a paused clock.
pub fn test_config(mode: StrategyMode) -> Config {
    Config {
        mode,
        merge: MergeConfig { window_secs: 2 },
        verification: VerificationConfig {
            sample_interval_ms: 100,
            default_window_seconds: 2,
        },
        coordinator: CoordinatorConfig {
            stable_after_secs: 1,
            ..CoordinatorConfig::default()
        },
        ..Config::default()
    }
}

pub fn start_runtime(mode: StrategyMode) -> CoreRuntime {
    CoreRuntime::start(&test_config(mode)).expect("runtime should start")
}

pub fn conflict_problem(id: &str) -> Problem {
    Problem::new(
        id,
        ProblemType::Conflict,
        vec!["FLT-100".to_string(), "FLT-200".to_string()],
        Location::sector("airspace-sector-1"),
        Severity::Critical,
    )
}

pub fn hotspot_problem(id: &str) -> Problem {
    Problem::new(
        id,
        ProblemType::Hotspot,
        vec!["FLT-300".to_string(), "FLT-301".to_string()],
        Location::sector("airspace-sector-2"),
        Severity::Info,
    )
}

pub async fn publish_problem(bus: &Arc<EventBus>, problem: Problem) {
    let topic = match problem.problem_type {
        ProblemType::Conflict => Topic::ConflictDetected,
        ProblemType::Hotspot => Topic::HotspotDetected,
        ProblemType::Violation => Topic::ValidationViolation,
    };
    bus.publish(
        topic,
        problem.severity,
        Some(problem.problem_id.clone()),
        EventPayload::Problem(problem),
    )
    .await;
}

/// Wait until some fix for the given correlation id reaches the status.
pub async fn wait_for_status(
    store: &Arc<FixStore>,
    correlation_id: &str,
    status: FixStatus,
) -> Fix {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        let found = store
            .all()
            .await
            .into_iter()
            .find(|f| f.correlation_id == correlation_id && f.status == status);
        if let Some(fix) = found {
            return fix;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no fix for {correlation_id} reached {status}"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Wait until any fix exists for the correlation id.
pub async fn wait_for_fix(store: &Arc<FixStore>, correlation_id: &str) -> Fix {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        let found = store
            .all()
            .await
            .into_iter()
            .find(|f| f.correlation_id == correlation_id);
        if let Some(fix) = found {
            return fix;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no fix proposed for {correlation_id}"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Drain events already delivered to this receiver, without waiting.
pub fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<BusEvent>) -> Vec<BusEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
