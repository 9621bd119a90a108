use chrono::{DateTime, Utc};
use ensemble_core::{EnsembleError, EnsembleResult, ErrorRecord, SynthesisOutput, TaskGraph, WorkerResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a request session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Initializing,
    Decomposed,
    Executing,
    Synthesized,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Synthesized | SessionState::Failed)
    }

    /// Success path moves one stage at a time; `Failed` is reachable from any
    /// non-terminal state.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Initializing, Decomposed) | (Decomposed, Executing) | (Executing, Synthesized) => {
                true
            }
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Initializing => write!(f, "INITIALIZING"),
            SessionState::Decomposed => write!(f, "DECOMPOSED"),
            SessionState::Executing => write!(f, "EXECUTING"),
            SessionState::Synthesized => write!(f, "SYNTHESIZED"),
            SessionState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Everything known about one request as it moves through the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub request: String,
    /// Caller-supplied context, passed to the planner.
    #[serde(default)]
    pub context: serde_json::Value,
    pub state: SessionState,
    pub decomposition: Option<TaskGraph>,
    /// Results in the order they settled.
    pub results: Vec<WorkerResult>,
    pub synthesis: Option<SynthesisOutput>,
    #[serde(default)]
    pub errors: Vec<ErrorRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Start a session for `request`, generating an id when none is given.
    pub fn new(id: Option<String>, request: impl Into<String>, context: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            request: request.into(),
            context,
            state: SessionState::Initializing,
            decomposition: None,
            results: Vec::new(),
            synthesis: None,
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Move to `next`, rejecting skipped stages and moves out of a terminal state.
    pub fn transition(&mut self, next: SessionState) -> EnsembleResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(EnsembleError::Session(format!(
                "session {} cannot move from {} to {}",
                self.id, self.state, next
            )));
        }
        let now = Utc::now();
        self.state = next;
        self.updated_at = now;
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    pub fn set_decomposition(&mut self, graph: TaskGraph) -> EnsembleResult<()> {
        self.transition(SessionState::Decomposed)?;
        self.decomposition = Some(graph);
        Ok(())
    }

    pub fn set_synthesis(&mut self, synthesis: SynthesisOutput) -> EnsembleResult<()> {
        self.transition(SessionState::Synthesized)?;
        self.synthesis = Some(synthesis);
        Ok(())
    }

    /// Mark the session failed, keeping the error that caused it.
    pub fn fail(&mut self, error: &EnsembleError) -> EnsembleResult<()> {
        self.transition(SessionState::Failed)?;
        self.errors.push(ErrorRecord::from(error));
        Ok(())
    }

    pub fn append_results(&mut self, results: impl IntoIterator<Item = WorkerResult>) {
        self.results.extend(results);
        self.updated_at = Utc::now();
    }

    pub fn record_error(&mut self, record: ErrorRecord) {
        self.errors.push(record);
        self.updated_at = Utc::now();
    }

    /// Whether the retention window after completion has passed.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        self.completed_at
            .map(|completed| now - completed >= ttl)
            .unwrap_or(false)
    }
}
