use crate::worker::{Worker, WorkerDescriptor};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Name → worker mapping consulted by the planner, executor, and health check.
///
/// Ordered by name so fallback routing and health reports are deterministic.
/// Cloning is cheap (workers are shared behind `Arc`), which lets the
/// orchestrator swap in a modified copy while in-flight requests keep theirs.
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    workers: BTreeMap<String, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            workers: BTreeMap::new(),
        }
    }

    /// Register a worker under its descriptor name, returning any worker it replaced.
    pub fn register(&mut self, worker: Arc<dyn Worker>) -> Option<Arc<dyn Worker>> {
        let name = worker.descriptor().name.clone();
        let previous = self.workers.insert(name.clone(), worker);
        if previous.is_some() {
            warn!(worker = %name, "Replaced existing worker");
        } else {
            info!(worker = %name, "Registered worker");
        }
        previous
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Worker>> {
        let removed = self.workers.remove(name);
        if removed.is_some() {
            info!(worker = %name, "Unregistered worker");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Worker>> {
        self.workers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.workers.keys().map(String::as_str).collect()
    }

    pub fn list_descriptors(&self) -> Vec<&WorkerDescriptor> {
        self.workers.values().map(|w| w.descriptor()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Worker>)> {
        self.workers.iter().map(|(name, w)| (name.as_str(), w))
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("workers", &self.names())
            .finish()
    }
}
