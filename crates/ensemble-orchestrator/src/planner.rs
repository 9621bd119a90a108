use async_trait::async_trait;
use ensemble_core::{Complexity, EnsembleError, EnsembleResult, Task, TaskGraph};
use ensemble_workers::WorkerDescriptor;
use serde_json::Value;

/// Context key under which the engine lists the registered workers for the planner.
pub const AVAILABLE_AGENTS_KEY: &str = "availableAgents";

/// Decomposes a request into a task graph.
///
/// Implementations are usually backed by a language model. Any error, or a
/// graph that fails validation, makes the engine fall back to
/// [`fallback_decomposition`], so a planner never has to be infallible.
#[async_trait]
pub trait Planner: Send + Sync {
    /// `context` is the caller's context plus an `availableAgents` array of
    /// worker descriptors.
    async fn decompose(&self, request: &str, context: &Value) -> EnsembleResult<TaskGraph>;
}

/// Planner used when no oracle is configured: always the keyword-matched single task.
#[derive(Debug, Clone, Default)]
pub struct KeywordPlanner {
    fallback_agent: Option<String>,
}

impl KeywordPlanner {
    pub fn new(fallback_agent: Option<String>) -> Self {
        Self { fallback_agent }
    }
}

#[async_trait]
impl Planner for KeywordPlanner {
    async fn decompose(&self, request: &str, context: &Value) -> EnsembleResult<TaskGraph> {
        let agents = context
            .get(AVAILABLE_AGENTS_KEY)
            .cloned()
            .map(serde_json::from_value::<Vec<WorkerDescriptor>>)
            .transpose()
            .map_err(|e| EnsembleError::Decomposition(format!("unreadable agent list: {e}")))?
            .unwrap_or_default();
        let refs: Vec<&WorkerDescriptor> = agents.iter().collect();
        fallback_decomposition(request, &refs, self.fallback_agent.as_deref())
    }
}

/// Build the single-task graph used when planning fails.
///
/// The task goes to the worker whose keywords best match the request. Ties go
/// to `fallback_agent`, then to the alphabetically first name. With no keyword
/// hits, `fallback_agent` (if present) or the alphabetically first worker is used.
pub fn fallback_decomposition(
    request: &str,
    workers: &[&WorkerDescriptor],
    fallback_agent: Option<&str>,
) -> EnsembleResult<TaskGraph> {
    let (agent, score) = select_worker(request, workers, fallback_agent).ok_or_else(|| {
        EnsembleError::Orchestration("no workers registered to handle the request".to_string())
    })?;

    let reasoning = if score > 0 {
        format!("fallback: '{agent}' matched {score} keyword(s)")
    } else {
        format!("fallback: no keyword matched, defaulting to '{agent}'")
    };

    let task = Task::new(agent, request, 1).with_expected_output("A direct answer to the request");
    let mut graph = TaskGraph::new("fallback", vec![task])
        .with_complexity(Complexity::Simple)
        .with_reasoning(reasoning);
    graph.fallback = true;
    Ok(graph)
}

fn select_worker<'a>(
    request: &str,
    workers: &[&'a WorkerDescriptor],
    fallback_agent: Option<&str>,
) -> Option<(&'a str, usize)> {
    let mut sorted: Vec<&WorkerDescriptor> = workers.to_vec();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let request = request.to_lowercase();
    let is_fallback = |name: &str| fallback_agent == Some(name);

    let mut best: Option<(&WorkerDescriptor, usize)> = None;
    for worker in &sorted {
        let score = worker
            .keywords
            .iter()
            .filter(|k| !k.is_empty() && request.contains(k.as_str()))
            .count();
        if score == 0 {
            continue;
        }
        best = match best {
            None => Some((worker, score)),
            Some((current, best_score)) => {
                let wins = score > best_score
                    || (score == best_score && is_fallback(&worker.name) && !is_fallback(&current.name));
                if wins {
                    Some((worker, score))
                } else {
                    Some((current, best_score))
                }
            }
        };
    }

    if let Some((worker, score)) = best {
        return Some((worker.name.as_str(), score));
    }

    sorted
        .iter()
        .find(|w| is_fallback(&w.name))
        .or_else(|| sorted.first())
        .map(|w| (w.name.as_str(), 0))
}
