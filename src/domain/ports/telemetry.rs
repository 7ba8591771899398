//! Telemetry source port.
//!
//! The verification engine samples named metrics through this seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One telemetry sample for a named metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric_name: String,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

impl MetricSample {
    pub fn now(metric_name: impl Into<String>, value: f64) -> Self {
        Self {
            metric_name: metric_name.into(),
            value,
            recorded_at: Utc::now(),
        }
    }
}

/// Port trait for reading telemetry.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Latest sample for a metric recorded at or after `since`, if any.
    async fn latest(&self, metric_name: &str, since: DateTime<Utc>) -> Option<MetricSample>;
}
