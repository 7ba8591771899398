//! Event store port.
//!
//! The bus optionally appends every published event here for audit and
//! replay. Persistence technology is out of scope for this core; the
//! shipped implementation is in-memory and the trait is the seam a real
//! store would plug into.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::services::event_bus::BusEvent;

/// Port trait for event persistence.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one event to the log.
    async fn append(&self, event: &BusEvent) -> DomainResult<()>;

    /// Events recorded so far, in sequence order.
    async fn all(&self) -> DomainResult<Vec<BusEvent>>;
}
