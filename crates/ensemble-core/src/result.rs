use crate::error::ErrorRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token usage reported by a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// The record of one task execution, written once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    /// Task-local name of the task that produced this result.
    pub task: String,
    pub agent: String,
    pub priority: u32,
    pub success: bool,
    /// Raw worker text; empty when the task failed.
    pub output: String,
    /// Structured form of `output`, when it contained JSON.
    pub parsed: Option<serde_json::Value>,
    /// Confidence in `[0, 1]` extracted from the output, when one was found.
    pub confidence: Option<f64>,
    pub usage: Usage,
    pub cost_usd: Option<f64>,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
    /// Number of invocations made, including retries.
    pub attempts: u32,
    pub timed_out: bool,
    pub error: Option<ErrorRecord>,
}

impl WorkerResult {
    /// The failure message, if this result is a failure.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_total() {
        assert_eq!(Usage::new(120, 30).total(), 150);
        assert_eq!(Usage::default().total(), 0);
        assert_eq!(Usage::new(u64::MAX, 1).total(), u64::MAX);
    }
}
