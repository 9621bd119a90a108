use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A convenience `Result` alias using [`EnsembleError`].
pub type EnsembleResult<T> = Result<T, EnsembleError>;

/// Top-level error type for the Ensemble engine.
///
/// Only [`EnsembleError::Orchestration`] ever reaches a `process_query` caller;
/// every other variant is recovered or recorded by the engine.
#[derive(Error, Debug)]
pub enum EnsembleError {
    /// The planner failed or produced a structurally invalid task graph.
    #[error("Decomposition error: {0}")]
    Decomposition(String),

    /// A worker did not answer before its deadline.
    #[error("Worker '{agent}' timed out after {timeout_ms}ms")]
    WorkerTimeout {
        /// Name of the worker that timed out.
        agent: String,
        /// The deadline that expired.
        timeout_ms: u64,
    },

    /// A worker reported an error or could not be invoked.
    #[error("Worker error: {0}")]
    Worker(String),

    /// The synthesis oracle failed or returned an invalid object.
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// The request could not be orchestrated at all.
    #[error("Orchestration error: {0}")]
    Orchestration(String),

    /// Session lookup or lifecycle violation.
    #[error("Session error: {0}")]
    Session(String),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnsembleError {
    /// Name of the component that raised this error, used in [`ErrorRecord`]s.
    pub fn component(&self) -> &'static str {
        match self {
            EnsembleError::Decomposition(_) => "planner",
            EnsembleError::WorkerTimeout { .. } | EnsembleError::Worker(_) => "executor",
            EnsembleError::Synthesis(_) => "synthesizer",
            EnsembleError::Orchestration(_) => "orchestrator",
            EnsembleError::Session(_) => "session",
            EnsembleError::Config(_) => "config",
            EnsembleError::Json(_) | EnsembleError::Io(_) => "io",
        }
    }

    /// Whether this error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, EnsembleError::WorkerTimeout { .. })
    }
}

/// A failure preserved for observability: who failed, why, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Component that raised the error (`planner`, `executor`, a worker name, ...).
    pub component: String,
    /// Original error text.
    pub message: String,
    /// When the error was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    /// Record an error raised by `component` now.
    pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

impl From<&EnsembleError> for ErrorRecord {
    fn from(err: &EnsembleError) -> Self {
        ErrorRecord::new(err.component(), err.to_string())
    }
}
