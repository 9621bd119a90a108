use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Counters for one worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub retries: u64,
    pub tokens_used: u64,
    /// Sum of task latencies, retries included.
    pub latency_ms: u64,
}

/// Owned copy of every counter at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub successful_queries: u64,
    pub failed_queries: u64,
    pub average_latency_ms: f64,
    pub total_invocations: u64,
    pub fallback_decompositions: u64,
    pub invalid_decompositions: u64,
    pub deterministic_syntheses: u64,
    pub agents: BTreeMap<String, AgentMetrics>,
}

/// Tracks query and worker metrics across all requests.
///
/// Callers only ever see [`MetricsSnapshot`]s; the counters themselves are
/// written by the engine and executor.
pub struct MetricsCollector {
    state: RwLock<MetricsSnapshot>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MetricsSnapshot::default()),
        }
    }

    /// Record a finished query and fold its latency into the running average.
    pub async fn record_query(&self, success: bool, latency_ms: u64) {
        let mut state = self.state.write().await;
        state.total_queries += 1;
        if success {
            state.successful_queries += 1;
        } else {
            state.failed_queries += 1;
        }
        let n = state.total_queries as f64;
        state.average_latency_ms += (latency_ms as f64 - state.average_latency_ms) / n;
    }

    /// Record one worker invocation attempt.
    pub async fn record_invocation(&self, agent: &str) {
        let mut state = self.state.write().await;
        state.total_invocations += 1;
        state.agents.entry(agent.to_string()).or_default().invocations += 1;
    }

    pub async fn record_success(&self, agent: &str, tokens: u64, latency_ms: u64) {
        let mut state = self.state.write().await;
        let metrics = state.agents.entry(agent.to_string()).or_default();
        metrics.successes += 1;
        metrics.tokens_used += tokens;
        metrics.latency_ms += latency_ms;
    }

    /// Record a task whose final attempt failed.
    pub async fn record_failure(&self, agent: &str, latency_ms: u64) {
        let mut state = self.state.write().await;
        let metrics = state.agents.entry(agent.to_string()).or_default();
        metrics.failures += 1;
        metrics.latency_ms += latency_ms;
    }

    pub async fn record_timeout(&self, agent: &str) {
        let mut state = self.state.write().await;
        state.agents.entry(agent.to_string()).or_default().timeouts += 1;
    }

    pub async fn record_retry(&self, agent: &str) {
        let mut state = self.state.write().await;
        state.agents.entry(agent.to_string()).or_default().retries += 1;
    }

    pub async fn record_invalid_decomposition(&self) {
        self.state.write().await.invalid_decompositions += 1;
    }

    pub async fn record_fallback_decomposition(&self) {
        self.state.write().await.fallback_decompositions += 1;
    }

    pub async fn record_deterministic_synthesis(&self) {
        self.state.write().await.deterministic_syntheses += 1;
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        self.state.read().await.clone()
    }

    /// Get the counters of one worker.
    pub async fn agent(&self, name: &str) -> Option<AgentMetrics> {
        self.state.read().await.agents.get(name).cloned()
    }

    /// Serialize the current counters as JSON.
    pub async fn to_json(&self) -> serde_json::Value {
        let snapshot = self.snapshot().await;
        serde_json::to_value(&snapshot).unwrap_or(serde_json::Value::Null)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
