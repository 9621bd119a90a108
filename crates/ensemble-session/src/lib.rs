//! Per-request sessions for the Ensemble orchestration engine.
//!
//! A [`Session`] follows one request through its lifecycle
//! (initializing → decomposed → executing → synthesized, or failed) and keeps
//! its decomposition, result log, and final synthesis. Sessions live in memory
//! only and are evicted a fixed retention window after they complete.

pub mod session;
pub mod store;

pub use session::{Session, SessionState};
pub use store::{spawn_sweeper, InMemorySessionStore, SessionStore};
