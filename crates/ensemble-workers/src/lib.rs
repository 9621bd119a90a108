//! Pluggable workers for the Ensemble orchestration engine.
//!
//! A worker is a named capability the executor invokes with an assembled
//! prompt and a deadline. This crate defines the [`Worker`] trait, the
//! [`WorkerRegistry`] the orchestrator routes through, and two built-in
//! workers that can be declared in configuration.
//!
//! # Main types
//!
//! - [`Worker`] — Trait every worker implements.
//! - [`WorkerDescriptor`] — Name, description, claim category, and routing keywords.
//! - [`WorkerRegistry`] — Ordered name → worker mapping.
//! - [`StaticWorker`] — Answers with a fixed template.
//! - [`CommandWorker`] — Runs an external program per invocation.

/// Process-backed worker.
pub mod command;
/// Worker entries from configuration.
pub mod loader;
/// Name → worker registry.
pub mod registry;
/// Fixed-template worker.
pub mod static_worker;
/// The worker trait and its invocation types.
pub mod worker;

pub use command::CommandWorker;
pub use loader::{load_all, WorkerConfig, WorkerKind};
pub use registry::WorkerRegistry;
pub use static_worker::StaticWorker;
pub use worker::{InvokeOptions, Worker, WorkerDescriptor, WorkerHealth, WorkerOutput};
