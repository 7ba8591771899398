//! Service layer: the coordination core.

pub mod coordinator;
pub mod deployer;
pub mod event_bus;
pub mod fix_store;
pub mod rollback;
pub mod strategy;
pub mod verifier;

pub use coordinator::{DecisionResult, FixCoordinator};
pub use deployer::Deployer;
pub use event_bus::{BusEvent, EventBus, EventPayload, ReviewDecision, ReviewVerb, Topic};
pub use fix_store::FixStore;
pub use rollback::RollbackHandler;
pub use strategy::{AgenticStrategy, LlmStrategy, RulesStrategy, SolutionStrategy};
pub use verifier::VerificationEngine;
