//! Problem domain model.
//!
//! A Problem is a detected airspace/transit/power issue published by an
//! external detection collaborator. It is immutable once detected; this
//! core only consumes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a detected problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    /// Two or more entities on converging trajectories.
    Conflict,
    /// Congestion concentration in a sector.
    Hotspot,
    /// A plan or track violating an airspace/transit rule.
    Violation,
}

impl ProblemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::Hotspot => "hotspot",
            Self::Violation => "violation",
        }
    }
}

impl std::fmt::Display for ProblemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event severity levels, shared by problems and bus events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the problem was detected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Identifier for the affected sector/area.
    pub sector_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

impl Location {
    pub fn sector(sector_id: impl Into<String>) -> Self {
        Self {
            sector_id: sector_id.into(),
            lat: None,
            lon: None,
        }
    }
}

/// Detection-specific measurements attached to a problem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// Predicted time of closest approach for time-window conflicts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_separation_nm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_separation_nm: Option<f64>,
    /// Traffic density score for hotspots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
    /// Identifier of the violated rule, for validation violations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

/// A detected issue requiring remediation.
///
/// Owned by the detection collaborator; this core treats it as read-only
/// input and carries `problem_id` downstream as the correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Stable identifier assigned by the detector (e.g. `CONF-001`).
    pub problem_id: String,
    pub problem_type: ProblemType,
    /// Flight/vehicle/sector identifiers involved.
    pub affected_entities: Vec<String>,
    pub location: Location,
    pub severity: Severity,
    #[serde(default = "Utc::now")]
    pub detected_at: DateTime<Utc>,
    #[serde(default)]
    pub details: ProblemDetails,
}

impl Problem {
    pub fn new(
        problem_id: impl Into<String>,
        problem_type: ProblemType,
        affected_entities: Vec<String>,
        location: Location,
        severity: Severity,
    ) -> Self {
        Self {
            problem_id: problem_id.into(),
            problem_type,
            affected_entities,
            location,
            severity,
            detected_at: Utc::now(),
            details: ProblemDetails::default(),
        }
    }

    pub fn with_details(mut self, details: ProblemDetails) -> Self {
        self.details = details;
        self
    }

    /// Basic shape checks before the problem enters the pipeline.
    pub fn validate(&self) -> Result<(), String> {
        if self.problem_id.trim().is_empty() {
            return Err("problem_id cannot be empty".to_string());
        }
        if self.affected_entities.is_empty() {
            return Err("problem must affect at least one entity".to_string());
        }
        Ok(())
    }
}

/// Latest known state vector for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityTrack {
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_ft: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_kn: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_deg: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route: Vec<String>,
}

/// Snapshot of entity trajectories handed to strategies as context.
///
/// Updated from `trajectory.sampled` events; strategies look up current
/// altitude/speed here before proposing deltas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySnapshot {
    pub captured_at: Option<DateTime<Utc>>,
    pub tracks: Vec<EntityTrack>,
}

impl TrajectorySnapshot {
    pub fn track(&self, entity_id: &str) -> Option<&EntityTrack> {
        self.tracks.iter().find(|t| t.entity_id == entity_id)
    }

    /// Insert or replace the track for an entity.
    pub fn upsert(&mut self, track: EntityTrack) {
        self.captured_at = Some(Utc::now());
        if let Some(existing) = self
            .tracks
            .iter_mut()
            .find(|t| t.entity_id == track.entity_id)
        {
            *existing = track;
        } else {
            self.tracks.push(track);
        }
    }

    /// Restrict the snapshot to the given entities (bounded LLM context).
    pub fn restricted_to(&self, entity_ids: &[String]) -> Self {
        Self {
            captured_at: self.captured_at,
            tracks: self
                .tracks
                .iter()
                .filter(|t| entity_ids.contains(&t.entity_id))
                .cloned()
                .collect(),
        }
    }
}
