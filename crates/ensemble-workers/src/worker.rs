use async_trait::async_trait;
use ensemble_core::{EnsembleResult, Usage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Metadata describing a worker: what it does and how requests are routed to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    pub name: String,
    pub description: String,
    /// Claim category used when merging results; see the aggregator's category map.
    #[serde(default)]
    pub category: Option<String>,
    /// Lower-case keywords the fallback decomposition matches against a request.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl WorkerDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category: None,
            keywords: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords
            .into_iter()
            .map(|k| k.into().to_lowercase())
            .collect();
        self
    }
}

/// Per-invocation options handed to a worker.
#[derive(Debug, Clone)]
pub struct InvokeOptions {
    /// Task-local name of the task being executed.
    pub task: String,
    /// Deadline the executor enforces on this invocation.
    pub timeout: Duration,
    /// 1 for the first invocation, 2 for the first retry, ...
    pub attempt: u32,
    /// Cancelled when the executor abandons the invocation.
    pub cancel: CancellationToken,
}

impl InvokeOptions {
    pub fn new(task: impl Into<String>, timeout: Duration) -> Self {
        Self {
            task: task.into(),
            timeout,
            attempt: 1,
            cancel: CancellationToken::new(),
        }
    }
}

/// What a worker hands back on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerOutput {
    pub text: String,
    #[serde(default)]
    pub usage: Usage,
    /// Provider-specific payload, kept verbatim.
    #[serde(default)]
    pub raw: serde_json::Value,
    #[serde(default)]
    pub cost_usd: Option<f64>,
}

impl WorkerOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}

/// Result of a worker's own health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHealth {
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl WorkerHealth {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            detail: None,
        }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            healthy: false,
            detail: Some(detail.into()),
        }
    }
}

/// Trait that all workers implement: built-in, process-backed, or model-backed.
///
/// Errors returned from [`Worker::execute`] never escape the executor: they are
/// recorded as failed results and retried per policy.
#[async_trait]
pub trait Worker: Send + Sync {
    fn descriptor(&self) -> &WorkerDescriptor;

    async fn execute(&self, prompt: &str, options: &InvokeOptions) -> EnsembleResult<WorkerOutput>;

    /// Probe used by the orchestrator's health check.
    async fn health(&self) -> WorkerHealth {
        WorkerHealth::healthy()
    }
}
