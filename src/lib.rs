//! Chronos - Incident Remediation Core
//!
//! Chronos ingests simulated airspace/transit/power incidents, generates
//! corrective "fixes" through one of three interchangeable strategies
//! (deterministic rules, single-call LLM, agentic task decomposition),
//! and carries each fix through a governed lifecycle: review, approval,
//! simulated deployment, telemetry-based verification, and rollback.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors, and the ports the core
//!   depends on
//! - **Service Layer** (`services`): event bus, strategies, coordinator,
//!   deployer, verification engine, rollback handler
//! - **Infrastructure Layer** (`infrastructure`): adapters behind the
//!   ports (HTTP LLM client, simulated sandbox, in-memory telemetry and
//!   event store, config loading, logging)
//! - **CLI Layer** (`cli`): the `chronos` binary and scenario replay
//!
//! All inter-component communication is publish/subscribe over the event
//! bus; every fix lifecycle event carries the full, growing fix record.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, Fix, FixStatus, Problem, ProblemType, RiskLevel, Severity, Solution, StrategyMode,
    TrajectorySnapshot,
};
pub use infrastructure::{ConfigError, ConfigLoader};
pub use services::{
    DecisionResult, EventBus, FixCoordinator, FixStore, SolutionStrategy, Topic,
    VerificationEngine,
};
