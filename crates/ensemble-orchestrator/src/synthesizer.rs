use crate::aggregator::ConflictResolution;
use async_trait::async_trait;
use ensemble_core::{EnsembleResult, SynthesisOutput, TaskGraph, WorkerResult};
use serde::Serialize;

/// Everything the synthesis oracle gets to work with.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisInput {
    pub original_request: String,
    pub decomposition: TaskGraph,
    /// The full result log, failures included.
    pub results: Vec<WorkerResult>,
    /// Conflicts already resolved by the aggregator.
    pub conflicts: Vec<ConflictResolution>,
}

/// Merges worker results into one response, usually via a language model.
///
/// An error or an empty `synthesis` makes the aggregator fall back to its
/// deterministic synthesis. The returned metadata is recomputed by the
/// aggregator, so implementations may leave it at any value.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, input: &SynthesisInput) -> EnsembleResult<SynthesisOutput>;
}
