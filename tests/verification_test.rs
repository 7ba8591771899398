//! Verification engine integration: timing guarantees and the automatic
//! rollback of fixes that fail their telemetry checks.

mod common;

use chronos::domain::models::config::StrategyMode;
use chronos::domain::models::fix::FixStatus;
use chronos::domain::models::verification::VerificationStatus;

use common::{conflict_problem, hotspot_problem, publish_problem, start_runtime, wait_for_status};

#[tokio::test(start_paused = true)]
async fn favorable_metric_verifies_fix_within_window() {
    let runtime = start_runtime(StrategyMode::Rules);

    publish_problem(&runtime.bus, hotspot_problem("HOT-020")).await;
    let fix = wait_for_status(&runtime.store, "HOT-020", FixStatus::DeploySucceeded).await;

    runtime.telemetry.push("hotspot_congestion", 0.1).await;

    let verified = wait_for_status(&runtime.store, "HOT-020", FixStatus::Verified).await;
    assert!(verified.verified_at.is_some());

    let record = runtime.verifier.record(&fix.fix_id).await.unwrap();
    assert_eq!(record.status, VerificationStatus::Verified);
    assert_eq!(record.metrics.failed, 0);
    assert_eq!(record.metrics.passed, record.metrics.total_actions);
    // The timeline captured start, per-action passes, and the close-out.
    assert!(record.timeline.len() >= record.metrics.total_actions + 2);
}

#[tokio::test(start_paused = true)]
async fn silent_telemetry_fails_fix_and_requests_rollback() {
    let runtime = start_runtime(StrategyMode::Rules);

    publish_problem(&runtime.bus, hotspot_problem("HOT-021")).await;
    let fix = wait_for_status(&runtime.store, "HOT-021", FixStatus::DeploySucceeded).await;

    // No telemetry at all: every action times out at its window, the fix
    // fails, a rollback is requested and then executed by the handler.
    let rolled_back =
        wait_for_status(&runtime.store, "HOT-021", FixStatus::RollbackSucceeded).await;
    assert!(rolled_back
        .rollback_reason
        .as_deref()
        .unwrap()
        .contains("verification failed"));

    let record = runtime.verifier.record(&fix.fix_id).await.unwrap();
    assert_eq!(record.status, VerificationStatus::Failed);
    assert_eq!(record.metrics.failed, record.metrics.total_actions);

    // Rollback reverted every deployed action.
    assert_eq!(
        runtime.sandbox.reverted_count().await,
        runtime.sandbox.applied_count().await
    );
}

#[tokio::test(start_paused = true)]
async fn one_failing_action_fails_the_whole_fix() {
    let runtime = start_runtime(StrategyMode::Rules);

    // A conflict fix verifies two different metrics: separation for the
    // altitude action, congestion for the speed action.
    publish_problem(&runtime.bus, conflict_problem("CONF-022")).await;
    let fix = wait_for_status(&runtime.store, "CONF-022", FixStatus::ReviewRequired).await;
    assert!(runtime.coordinator.approve(&fix.fix_id, "op-1").await.success);

    wait_for_status(&runtime.store, "CONF-022", FixStatus::DeploySucceeded).await;
    // Separation recovers, congestion never does.
    runtime.telemetry.push("minimum_separation_nm", 7.0).await;
    runtime.telemetry.push("hotspot_congestion", 0.9).await;

    let fix = wait_for_status(&runtime.store, "CONF-022", FixStatus::RollbackSucceeded).await;
    assert!(fix
        .rollback_reason
        .as_deref()
        .unwrap()
        .contains("1 action(s) did not meet criteria"));

    let record = runtime.verifier.record(&fix.fix_id).await.unwrap();
    assert_eq!(record.metrics.passed, 1);
    assert_eq!(record.metrics.failed, 1);
}
