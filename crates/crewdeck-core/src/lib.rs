//! Core types and error definitions for crewdeck.
//!
//! This crate provides the foundational types shared across all crewdeck
//! crates: the unified error enum and the group (tenant) identity that every
//! execution, log entry and tool definition is scoped to.
//!
//! # Main types
//!
//! - [`CrewError`]: Unified error enum for all crewdeck subsystems.
//! - [`CrewResult`]: Convenience alias for `Result<T, CrewError>`.
//! - [`GroupContext`]: Identity of the caller and the group it acts in.
//! - [`GroupRole`]: Role of a user within a group.

/// Group isolation and identity context.
pub mod group;

pub use group::{GroupContext, GroupRole};

// --- Error types ---

/// Top-level error type for crewdeck.
///
/// The first four variants form the pipeline taxonomy (configuration,
/// materialization, execution, output processing); the rest are raised by
/// collaborators and infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum CrewError {
    /// A crew configuration is malformed or inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required configuration section is absent or empty.
    #[error("Missing or empty required section: {0}")]
    MissingSection(&'static str),

    /// An agent, task or crew could not be constructed.
    #[error("Materialization error: {0}")]
    Materialization(String),

    /// The crew invocation itself failed.
    #[error("{0}")]
    Execution(String),

    /// The raw result of an execution could not be interpreted.
    #[error("Failed to process output: {0}")]
    OutputProcessing(String),

    /// A model handle could not be built.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Managed-platform detection failed.
    #[error("Platform error: {0}")]
    Platform(String),

    /// A credential lookup failed.
    #[error("Credential error: {0}")]
    Credential(String),

    /// A tool could not be looked up or instantiated.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Persisting logs or outputs failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The caller's group role does not grant the requested action.
    #[error("Permission denied: {0}")]
    Permission(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`CrewError`].
pub type CrewResult<T> = Result<T, CrewError>;
