//! Infrastructure layer: adapters behind the domain ports.

pub mod config;
pub mod event_store;
pub mod llm;
pub mod logging;
pub mod sandbox;
pub mod telemetry;

pub use config::{ConfigError, ConfigLoader};
pub use event_store::InMemoryEventStore;
pub use llm::HttpLlmClient;
pub use sandbox::SimulatedSandbox;
pub use telemetry::InMemoryTelemetry;
