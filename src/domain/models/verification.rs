//! Verification record model.
//!
//! One record per fix, owned by the verification engine and updated
//! incrementally as each action's metric is sampled. The timeline is the
//! audit/replay surface for dashboards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Runtime state of a fix's verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    NotStarted,
    InProgress,
    Verified,
    Failed,
}

impl Default for VerificationStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Verified => "verified",
            Self::Failed => "failed",
        }
    }
}

/// Per-action tallies for a verification run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationMetrics {
    pub total_actions: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// One timeline entry: a sample decision or a status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub message: String,
}

/// Per-fix verification outcome, updated as samples arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub fix_id: String,
    pub status: VerificationStatus,
    pub metrics: VerificationMetrics,
    pub timeline: Vec<TimelineEntry>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl VerificationRecord {
    pub fn start(fix_id: impl Into<String>, total_actions: usize) -> Self {
        let mut record = Self {
            fix_id: fix_id.into(),
            status: VerificationStatus::InProgress,
            metrics: VerificationMetrics {
                total_actions,
                ..VerificationMetrics::default()
            },
            timeline: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        };
        record.log("verification_started", "Verification process initiated");
        record
    }

    /// Append a timeline entry.
    pub fn log(&mut self, status: impl Into<String>, message: impl Into<String>) {
        self.timeline.push(TimelineEntry {
            timestamp: Utc::now(),
            status: status.into(),
            message: message.into(),
        });
    }

    pub fn action_passed(&mut self, index: usize, metric_name: &str, value: f64) {
        self.metrics.passed += 1;
        self.log(
            "passed",
            format!("Action {index} passed verification: {metric_name} = {value}"),
        );
    }

    pub fn action_failed(&mut self, index: usize, metric_name: &str, threshold: f64) {
        self.metrics.failed += 1;
        self.log(
            "failed",
            format!("Action {index} failed verification: {metric_name} did not meet threshold {threshold} within window"),
        );
    }

    pub fn action_skipped(&mut self, index: usize, reason: &str) {
        self.metrics.skipped += 1;
        self.log("skipped", format!("Action {index} skipped: {reason}"));
    }

    /// Close the record with the overall outcome.
    pub fn finalize(&mut self) -> VerificationStatus {
        self.status = if self.metrics.failed == 0 {
            VerificationStatus::Verified
        } else {
            VerificationStatus::Failed
        };
        self.completed_at = Some(Utc::now());
        self.log(
            self.status.as_str(),
            format!(
                "{}/{} actions passed, {} failed, {} skipped",
                self.metrics.passed,
                self.metrics.total_actions,
                self.metrics.failed,
                self.metrics.skipped
            ),
        );
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lifecycle_all_pass() {
        let mut record = VerificationRecord::start("FIX-ABC", 2);
        assert_eq!(record.status, VerificationStatus::InProgress);

        record.action_passed(1, "delay_reduction", 3.0);
        record.action_passed(2, "hotspot_congestion", 0.2);
        assert_eq!(record.finalize(), VerificationStatus::Verified);
        assert!(record.completed_at.is_some());
        assert_eq!(record.metrics.passed, 2);
        // started + 2 passes + finalize
        assert_eq!(record.timeline.len(), 4);
    }

    #[test]
    fn test_single_failure_fails_record() {
        let mut record = VerificationRecord::start("FIX-DEF", 3);
        record.action_passed(1, "delay_reduction", 3.0);
        record.action_failed(2, "risk_score_delta", -0.1);
        record.action_skipped(3, "no verification criteria");
        assert_eq!(record.finalize(), VerificationStatus::Failed);
        assert_eq!(record.metrics.passed, 1);
        assert_eq!(record.metrics.failed, 1);
        assert_eq!(record.metrics.skipped, 1);
    }
}
