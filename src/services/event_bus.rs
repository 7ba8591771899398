//! Event bus for inter-component communication.
//!
//! All control flow in the core is asynchronous publish/subscribe over this
//! bus; no component calls another synchronously. Events carry a
//! monotonically increasing sequence number and an optional correlation id
//! (the originating problem's identifier).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::models::fix::{Fix, FixStatus};
use crate::domain::models::problem::{EntityTrack, Problem, Severity};
use crate::domain::models::solution::{PartialSolution, Solution, SubTask, SubTaskKind};
use crate::domain::ports::event_store::EventStore;
use crate::domain::ports::telemetry::MetricSample;

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing sequence number assigned by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    pub fn zero() -> Self {
        Self(0)
    }
}

/// Bus topics. The string forms are the external names; external brokers
/// would prefix problem topics with their domain (airspace/transit/power).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    // Consumed: problem detection and context
    ConflictDetected,
    HotspotDetected,
    ValidationViolation,
    TrajectorySampled,
    // Consumed: human decisions and telemetry
    HumanDecision,
    TelemetryMetric,
    // Agentic task fan-out
    TaskDeconflict,
    TaskHotspotMitigation,
    TaskValidationFix,
    TaskPartialSolution,
    // Solutions
    SolutionProposed,
    // Fix lifecycle
    FixProposed,
    FixReviewRequired,
    FixApproved,
    FixRejected,
    FixDeployRequested,
    FixDeployStarted,
    FixDeploySucceeded,
    FixDeployFailed,
    FixVerified,
    FixRollbackRequested,
    FixRollbackSucceeded,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConflictDetected => "conflict.detected",
            Self::HotspotDetected => "hotspot.detected",
            Self::ValidationViolation => "validation.violation",
            Self::TrajectorySampled => "trajectory.sampled",
            Self::HumanDecision => "human.decision",
            Self::TelemetryMetric => "telemetry.metric",
            Self::TaskDeconflict => "task.deconflict",
            Self::TaskHotspotMitigation => "task.hotspot_mitigation",
            Self::TaskValidationFix => "task.validation_fix",
            Self::TaskPartialSolution => "task.partial_solution",
            Self::SolutionProposed => "solution.proposed",
            Self::FixProposed => "fix.proposed",
            Self::FixReviewRequired => "fix.review_required",
            Self::FixApproved => "fix.approved",
            Self::FixRejected => "fix.rejected",
            Self::FixDeployRequested => "fix.deploy_requested",
            Self::FixDeployStarted => "fix.deploy_started",
            Self::FixDeploySucceeded => "fix.deploy_succeeded",
            Self::FixDeployFailed => "fix.deploy_failed",
            Self::FixVerified => "fix.verified",
            Self::FixRollbackRequested => "fix.rollback_requested",
            Self::FixRollbackSucceeded => "fix.rollback_succeeded",
        }
    }

    /// Topic for a fix lifecycle status.
    pub fn for_fix_status(status: FixStatus) -> Self {
        match status {
            FixStatus::Proposed => Self::FixProposed,
            FixStatus::ReviewRequired => Self::FixReviewRequired,
            FixStatus::Approved => Self::FixApproved,
            FixStatus::Rejected => Self::FixRejected,
            FixStatus::DeployRequested => Self::FixDeployRequested,
            FixStatus::DeployStarted => Self::FixDeployStarted,
            FixStatus::DeploySucceeded => Self::FixDeploySucceeded,
            FixStatus::DeployFailed => Self::FixDeployFailed,
            FixStatus::Verified | FixStatus::Stable => Self::FixVerified,
            FixStatus::VerificationFailed | FixStatus::RollbackRequested => {
                Self::FixRollbackRequested
            }
            FixStatus::RollbackSucceeded => Self::FixRollbackSucceeded,
        }
    }

    /// Topic a sub-task is routed on, by kind.
    pub fn for_subtask(kind: SubTaskKind) -> Self {
        match kind {
            SubTaskKind::Deconflict => Self::TaskDeconflict,
            SubTaskKind::HotspotMitigation => Self::TaskHotspotMitigation,
            SubTaskKind::ValidationFix => Self::TaskValidationFix,
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Review verbs arriving from the review UI or operator tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerb {
    Approve,
    Hold,
    Dismiss,
    /// Synonym of dismiss, kept for decision-event compatibility.
    Reject,
    /// Operator flag on a verified fix.
    Rollback,
}

/// A human/policy decision on a fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub fix_id: String,
    pub verb: ReviewVerb,
    pub reviewer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Typed event payload. Fix lifecycle payloads always carry the full,
/// growing record — never a delta — so any subscriber can reconstruct
/// current state from the latest event alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    Problem(Problem),
    Track(EntityTrack),
    SubTask(SubTask),
    Partial(PartialSolution),
    Solution(Solution),
    Fix(Fix),
    Decision(ReviewDecision),
    Metric(MetricSample),
}

/// Event envelope published on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: EventId,
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub topic: Topic,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub payload: EventPayload,
}

impl BusEvent {
    /// The fix carried by this event, if it is a lifecycle event.
    pub fn fix(&self) -> Option<&Fix> {
        match &self.payload {
            EventPayload::Fix(fix) => Some(fix),
            _ => None,
        }
    }
}

/// Central event bus broadcasting to all subscribed services.
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
    sequence: AtomicU64,
    store: Option<Arc<dyn EventStore>>,
    persist_events: bool,
}

impl EventBus {
    pub fn new(channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity);
        Self {
            sender,
            sequence: AtomicU64::new(0),
            store: None,
            persist_events: false,
        }
    }

    /// Attach an event store for audit/replay.
    pub fn with_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.store = Some(store);
        self.persist_events = true;
        self
    }

    /// Publish an event, assigning its sequence number.
    pub async fn publish(
        &self,
        topic: Topic,
        severity: Severity,
        correlation_id: Option<String>,
        payload: EventPayload,
    ) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let event = BusEvent {
            id: EventId::new(),
            sequence: SequenceNumber(seq),
            timestamp: Utc::now(),
            topic,
            severity,
            correlation_id,
            payload,
        };

        if self.persist_events {
            if let Some(ref store) = self.store {
                if let Err(e) = store.append(&event).await {
                    tracing::warn!("Failed to persist event: {}", e);
                }
            }
        }

        // Ignore send errors: there may be no subscribers yet.
        let _ = self.sender.send(event);
    }

    /// Publish the full fix record on the topic matching its status.
    pub async fn publish_fix(&self, fix: &Fix) {
        let severity = match fix.status {
            FixStatus::DeployFailed | FixStatus::VerificationFailed => Severity::Error,
            FixStatus::RollbackRequested | FixStatus::Rejected => Severity::Warning,
            _ => Severity::Info,
        };
        self.publish(
            Topic::for_fix_status(fix.status),
            severity,
            Some(fix.correlation_id.clone()),
            EventPayload::Fix(fix.clone()),
        )
        .await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.load(Ordering::SeqCst))
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn store(&self) -> Option<Arc<dyn EventStore>> {
        self.store.clone()
    }
}
