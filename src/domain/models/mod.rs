//! Domain models.

pub mod config;
pub mod fix;
pub mod problem;
pub mod solution;
pub mod verification;

pub use config::{
    BusConfig, Config, CoordinatorConfig, LlmConfig, LoggingConfig, MergeConfig, StrategyMode,
    VerificationConfig,
};
pub use fix::{Fix, FixAction, FixStatus, MetricDirection, RiskLevel, VerificationSpec};
pub use problem::{
    EntityTrack, Location, Problem, ProblemDetails, ProblemType, Severity, TrajectorySnapshot,
};
pub use solution::{
    ActionKind, ActionParameters, EstimatedImpact, PartialSolution, ProposedAction, Solution,
    SolutionType, SubTask, SubTaskKind,
};
pub use verification::{
    TimelineEntry, VerificationMetrics, VerificationRecord, VerificationStatus,
};
