use ensemble_core::{EnsembleError, EnsembleResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Engine tunables, read from the `[orchestrator]` table of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum tasks of one request in flight at once.
    #[serde(default = "default_max_parallel_agents")]
    pub max_parallel_agents: usize,
    /// Deadline for a single worker invocation.
    #[serde(default = "default_agent_timeout_ms")]
    pub agent_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub enable_retry: bool,
    /// Retries after the first invocation, so a task runs at most `max_retries + 1` times.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// How long a completed session stays readable.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_session_sweep_interval_secs")]
    pub session_sweep_interval_secs: u64,
    #[serde(default = "default_health_probe_timeout_ms")]
    pub health_probe_timeout_ms: u64,
    /// Worker preferred by the fallback decomposition when keywords do not decide.
    #[serde(default)]
    pub fallback_agent: Option<String>,
    /// Worker name → claim category. Overrides the worker's own category.
    #[serde(default)]
    pub categories: HashMap<String, String>,
}

fn default_max_parallel_agents() -> usize {
    5
}

fn default_agent_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    1
}

fn default_session_ttl_secs() -> u64 {
    3_600
}

fn default_session_sweep_interval_secs() -> u64 {
    60
}

fn default_health_probe_timeout_ms() -> u64 {
    5_000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallel_agents: default_max_parallel_agents(),
            agent_timeout_ms: default_agent_timeout_ms(),
            enable_retry: true,
            max_retries: default_max_retries(),
            session_ttl_secs: default_session_ttl_secs(),
            session_sweep_interval_secs: default_session_sweep_interval_secs(),
            health_probe_timeout_ms: default_health_probe_timeout_ms(),
            fallback_agent: None,
            categories: HashMap::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> EnsembleResult<()> {
        let mut problems = Vec::new();
        if self.max_parallel_agents == 0 {
            problems.push("max_parallel_agents must be at least 1");
        }
        if self.agent_timeout_ms == 0 {
            problems.push("agent_timeout_ms must be positive");
        }
        if self.session_ttl_secs == 0 {
            problems.push("session_ttl_secs must be positive");
        }
        if self.session_sweep_interval_secs == 0 {
            problems.push("session_sweep_interval_secs must be positive");
        }
        if self.health_probe_timeout_ms == 0 {
            problems.push("health_probe_timeout_ms must be positive");
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(EnsembleError::Config(problems.join("; ")))
        }
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs)
    }

    pub fn health_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.health_probe_timeout_ms)
    }

    /// Retries a failed task may get under this configuration.
    pub fn retry_budget(&self) -> u32 {
        if self.enable_retry {
            self.max_retries
        } else {
            0
        }
    }
}
