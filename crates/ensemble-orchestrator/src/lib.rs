//! Multi-worker orchestration engine.
//!
//! Turns one request into a prioritized task graph, runs it in waves across
//! registered workers with deadlines, retries, and failure isolation, then
//! merges the results (resolving conflicting claims) into a single response.
//!
//! # Main types
//!
//! - [`Orchestrator`] — Top-level engine driving plan → schedule → execute → synthesize.
//! - [`Planner`] / [`KeywordPlanner`] — Decomposition oracle and its keyword fallback.
//! - [`ExecutionWave`] — A batch of tasks produced by [`build_waves`].
//! - [`Executor`] — Runs waves with bounded parallelism and retry.
//! - [`Aggregator`] / [`Synthesizer`] — Conflict resolution and response synthesis.
//! - [`MetricsCollector`] — Query and per-worker counters.
//! - [`OrchestratorConfig`] — Engine tunables.

/// Result merging, conflict resolution, and deterministic synthesis.
pub mod aggregator;
/// Engine configuration.
pub mod config;
/// Task input assembly from upstream results.
pub mod context;
/// Orchestration engine and its public surface.
pub mod engine;
/// Wave execution with deadlines and retries.
pub mod executor;
/// Task graph validation.
pub mod graph;
/// Query and worker metrics.
pub mod monitor;
/// Confidence and structured-output extraction.
pub mod parse;
/// Planner oracle and fallback decomposition.
pub mod planner;
/// Wave construction from a task graph.
pub mod scheduler;
/// Synthesis oracle interface.
pub mod synthesizer;

pub use aggregator::{Aggregation, Aggregator, CategoryMap, ConflictResolution, ResultOption};
pub use config::OrchestratorConfig;
pub use context::{ContextBuilder, TaskInput};
pub use engine::{
    HealthReport, HealthStatus, Orchestrator, QueryOptions, QueryResponse, ResponseMetadata,
};
pub use executor::Executor;
pub use monitor::{AgentMetrics, MetricsCollector, MetricsSnapshot};
pub use planner::{fallback_decomposition, KeywordPlanner, Planner};
pub use scheduler::{build_waves, ExecutionWave, WaveKind};
pub use synthesizer::{SynthesisInput, Synthesizer};
