use crate::error::{EnsembleError, EnsembleResult};
use crate::json::extract_json;
use serde::{Deserialize, Serialize};

/// Planner's estimate of how involved a request is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Simple,
    Moderate,
    Complex,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Complexity::Simple => write!(f, "simple"),
            Complexity::Moderate => write!(f, "moderate"),
            Complexity::Complex => write!(f, "complex"),
        }
    }
}

/// A bounded unit of work assigned to one named worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Name of the worker that executes this task.
    pub agent: String,
    /// Task-local name other tasks use in `dependencies`. Defaults to `agent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub objective: String,
    /// Positive; lower runs earlier.
    pub priority: u32,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub expected_output: String,
}

impl Task {
    pub fn new(agent: impl Into<String>, objective: impl Into<String>, priority: u32) -> Self {
        Self {
            agent: agent.into(),
            id: None,
            objective: objective.into(),
            priority,
            parallel: false,
            dependencies: Vec::new(),
            expected_output: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = expected.into();
        self
    }

    /// The name dependents refer to this task by.
    pub fn name(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.agent)
    }
}

/// A planner's decomposition of one request into prioritized tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGraph {
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub complexity: Complexity,
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub reasoning: String,
    /// Set when the graph came from the built-in keyword fallback rather than a planner.
    #[serde(default)]
    pub fallback: bool,
}

impl TaskGraph {
    pub fn new(intent: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            intent: intent.into(),
            complexity: Complexity::default(),
            tasks,
            reasoning: String::new(),
            fallback: false,
        }
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// Parse a task graph out of an oracle's free-text reply.
    pub fn from_llm_text(text: &str) -> EnsembleResult<Self> {
        let value = extract_json(text).ok_or_else(|| {
            EnsembleError::Decomposition("planner reply contains no JSON object".to_string())
        })?;
        serde_json::from_value(value)
            .map_err(|e| EnsembleError::Decomposition(format!("malformed task graph: {e}")))
    }

    /// Look up a task by its task-local name.
    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name() == name)
    }

    /// Distinct agent names referenced by the graph, in declaration order.
    pub fn agents(&self) -> Vec<&str> {
        let mut agents: Vec<&str> = Vec::new();
        for task in &self.tasks {
            if !agents.contains(&task.agent.as_str()) {
                agents.push(&task.agent);
            }
        }
        agents
    }
}
