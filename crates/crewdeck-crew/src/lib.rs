//! Crew preparation and execution pipeline.
//!
//! A [`CrewConfiguration`] goes through validation, agent and task
//! materialization and crew assembly on a [`CrewEngine`], then runs and is
//! normalized into an [`ExecutionOutput`].
//!
//! # Main types
//!
//! - [`CrewPreparation`]: one preparation and execution cycle.
//! - [`CrewEngine`]: the orchestration engine seam.
//! - [`PlanEngine`]: deterministic engine for dry runs.
//! - [`CrewExecutionService`]: authorized runs with logs and stored output.
//! - [`Scheduler`]: cron-driven runs.

/// Agent identity and the materialized agent set.
pub mod agents;
/// Crew configuration types and validation.
pub mod config;
/// Task context resolution.
pub mod context;
/// The engine seam.
pub mod engine;
/// Shared error handling.
pub mod errors;
/// Missing-data detection.
pub mod missing;
/// Model and credential selection.
pub mod model;
/// Output normalization.
pub mod output;
/// Deterministic plan engine.
pub mod plan_engine;
/// The preparation pipeline.
pub mod preparation;
/// Cron schedules.
pub mod schedule;
/// Execution service.
pub mod service;
/// Tool lookup and construction.
pub mod tools;

pub use agents::{agent_key, AgentSet, MaterializedAgent};
pub use config::{
    check_crew_config, validate_crew_config, AgentSpec, ContextRef, CrewConfiguration,
    EmbedderConfig, ProcessSpec, ProcessType, TaskSpec,
};
pub use context::MaterializedTask;
pub use engine::{CrewBlueprint, CrewEngine, TaskBlueprint};
pub use errors::{handle_crew_error, ErrorHandler, TracingErrorHandler};
pub use missing::{HeuristicMissingDataDetector, MissingDataDetector};
pub use model::{Credential, CredentialSource};
pub use output::{process_crew_output, CrewRun, ExecutionOutput, KickoffResult, TaskOutput};
pub use plan_engine::PlanEngine;
pub use preparation::{
    Collaborators, CrewPreparation, PreparationOptions, PreparationState, PreparationWarning,
};
pub use schedule::{run_schedule, CrewSchedule, Scheduler};
pub use service::{CrewExecutionService, ExecutionRecord, ExecutionRequest, ExecutionStatus};
pub use tools::{RegistryToolFactory, ToolDefinition, ToolFactory, ToolHandle, ToolRegistry, ToolService};
