//! Core types and error definitions for the Ensemble orchestration engine.
//!
//! This crate provides the foundational types shared across all Ensemble crates:
//! the error taxonomy, the task graph produced by a planner, and the result and
//! synthesis records that flow out of execution.
//!
//! # Main types
//!
//! - [`EnsembleError`] — Unified error enum for all Ensemble subsystems.
//! - [`EnsembleResult`] — Convenience alias for `Result<T, EnsembleError>`.
//! - [`ErrorRecord`] — A recorded failure (component, message, timestamp).
//! - [`Task`] / [`TaskGraph`] — A planner's decomposition of one request.
//! - [`WorkerResult`] — The append-only record of one task execution.
//! - [`SynthesisOutput`] — The merged response produced from all results.

/// Error taxonomy and recorded error entries.
pub mod error;
/// Forgiving JSON extraction from free text.
pub mod json;
/// Worker execution results and usage figures.
pub mod result;
/// Synthesis output and quality metadata.
pub mod synthesis;
/// Tasks and task graphs.
pub mod task;

pub use error::{EnsembleError, EnsembleResult, ErrorRecord};
pub use json::extract_json;
pub use result::{Usage, WorkerResult};
pub use synthesis::{QualityMetadata, SynthesisOutput, SynthesisQuality};
pub use task::{Complexity, Task, TaskGraph};
