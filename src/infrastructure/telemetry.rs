//! In-memory telemetry store.
//!
//! Keeps a bounded ring of samples per metric, fed from `telemetry.metric`
//! bus events (and directly by tests). The verification engine reads the
//! latest sample at or after a fix's deploy time.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tracing::warn;

use crate::domain::ports::telemetry::{MetricSample, TelemetrySource};
use crate::services::event_bus::{BusEvent, EventPayload, Topic};

/// Samples retained per metric.
const RING_CAPACITY: usize = 256;

#[derive(Default)]
pub struct InMemoryTelemetry {
    rings: Arc<RwLock<HashMap<String, VecDeque<MetricSample>>>>,
}

impl InMemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample directly (tests and the scenario runner).
    pub async fn push(&self, metric_name: impl Into<String>, value: f64) {
        self.record(MetricSample::now(metric_name, value)).await;
    }

    pub async fn record(&self, sample: MetricSample) {
        let mut rings = self.rings.write().await;
        let ring = rings.entry(sample.metric_name.clone()).or_default();
        if ring.len() == RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(sample);
    }

    /// Bus loop: ingest `telemetry.metric` events.
    pub async fn run(self: Arc<Self>, mut rx: broadcast::Receiver<BusEvent>) {
        loop {
            match rx.recv().await {
                Ok(BusEvent {
                    topic: Topic::TelemetryMetric,
                    payload: EventPayload::Metric(sample),
                    ..
                }) => self.record(sample).await,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "telemetry store lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

#[async_trait]
impl TelemetrySource for InMemoryTelemetry {
    async fn latest(&self, metric_name: &str, since: DateTime<Utc>) -> Option<MetricSample> {
        let rings = self.rings.read().await;
        rings
            .get(metric_name)?
            .iter()
            .rev()
            .find(|s| s.recorded_at >= since)
            .cloned()
    }
}
