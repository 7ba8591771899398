//! In-memory event store.
//!
//! Retains the published event log for audit and replay. Persistence
//! technology is deliberately out of scope; a durable store would
//! implement the same port.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::ports::event_store::EventStore;
use crate::services::event_bus::BusEvent;

#[derive(Default)]
pub struct InMemoryEventStore {
    events: RwLock<Vec<BusEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: &BusEvent) -> DomainResult<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn all(&self) -> DomainResult<Vec<BusEvent>> {
        Ok(self.events.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::problem::Severity;
    use crate::domain::ports::telemetry::MetricSample;
    use crate::services::event_bus::{EventBus, EventPayload, Topic};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_bus_appends_to_store() {
        let store = Arc::new(InMemoryEventStore::new());
        let bus = EventBus::new(8).with_store(store.clone());

        bus.publish(
            Topic::TelemetryMetric,
            Severity::Info,
            None,
            EventPayload::Metric(MetricSample::now("delay", 1.0)),
        )
        .await;

        let events = store.all().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].topic, Topic::TelemetryMetric);
    }
}
