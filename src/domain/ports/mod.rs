//! Ports: traits the core depends on, implemented by infrastructure.

pub mod actuation;
pub mod event_store;
pub mod llm_client;
pub mod telemetry;

pub use actuation::{ActuationError, ActuationSandbox};
pub use event_store::EventStore;
pub use llm_client::{CompletionRequest, LlmClient, LlmError};
pub use telemetry::{MetricSample, TelemetrySource};
