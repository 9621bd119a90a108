use crate::aggregator::{Aggregator, CategoryMap, ConflictResolution};
use crate::config::OrchestratorConfig;
use crate::executor::Executor;
use crate::graph;
use crate::monitor::MetricsCollector;
use crate::planner::{fallback_decomposition, KeywordPlanner, Planner, AVAILABLE_AGENTS_KEY};
use crate::scheduler::build_waves;
use crate::synthesizer::Synthesizer;
use chrono::{DateTime, Utc};
use ensemble_core::{
    Complexity, EnsembleError, EnsembleResult, ErrorRecord, QualityMetadata, TaskGraph,
    WorkerResult,
};
use ensemble_session::{
    spawn_sweeper, InMemorySessionStore, Session, SessionState, SessionStore,
};
use ensemble_workers::{Worker, WorkerDescriptor, WorkerHealth, WorkerRegistry};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

/// Per-request options for [`Orchestrator::process_query`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Reuse this id instead of generating one. Only allowed once the
    /// previous session with this id has finished.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Caller context handed to the planner.
    #[serde(default)]
    pub context: Option<Value>,
}

impl QueryOptions {
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// How a response was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    #[serde(flatten)]
    pub quality: QualityMetadata,
    pub intent: String,
    pub complexity: Complexity,
    /// Distinct agents that produced a usable result.
    pub agents_used: Vec<String>,
    pub failed_agents: Vec<String>,
    pub conflicts: Vec<ConflictResolution>,
    pub fallback_decomposition: bool,
    pub deterministic_synthesis: bool,
    pub total_tokens: u64,
    pub processing_time_ms: u64,
}

/// The merged answer to one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub session_id: String,
    pub query: String,
    pub synthesis: String,
    pub key_insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub agent_contributions: BTreeMap<String, String>,
    pub metadata: ResponseMetadata,
    pub timestamp: DateTime<Utc>,
}

/// Overall health of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Registry state plus each worker's own probe result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub total_workers: usize,
    pub healthy_workers: usize,
    pub workers: BTreeMap<String, WorkerHealth>,
    pub timestamp: DateTime<Utc>,
}

/// The orchestration engine: plan → schedule → execute → synthesize.
///
/// Every request works on a snapshot of the worker registry taken at entry,
/// so registering or removing workers never disturbs in-flight requests.
pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: RwLock<Arc<WorkerRegistry>>,
    planner: Arc<dyn Planner>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    sessions: Arc<dyn SessionStore>,
    metrics: Arc<MetricsCollector>,
}

impl Orchestrator {
    /// Create an engine with the keyword planner, deterministic synthesis,
    /// and an in-memory session store.
    pub fn new(config: OrchestratorConfig, registry: WorkerRegistry) -> EnsembleResult<Self> {
        config.validate()?;
        let planner = Arc::new(KeywordPlanner::new(config.fallback_agent.clone()));
        let sessions = Arc::new(InMemorySessionStore::new(config.session_ttl()));
        Ok(Self {
            config,
            registry: RwLock::new(Arc::new(registry)),
            planner,
            synthesizer: None,
            sessions,
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Get a reference to the metrics collector.
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Add or replace a worker. Returns the worker previously registered under that name.
    pub fn register_agent(&self, worker: Arc<dyn Worker>) -> Option<Arc<dyn Worker>> {
        let mut current = self.registry.write();
        let mut next = WorkerRegistry::clone(&current);
        let previous = next.register(worker);
        *current = Arc::new(next);
        previous
    }

    /// Remove a worker. Returns whether it was registered.
    pub fn unregister_agent(&self, name: &str) -> bool {
        let mut current = self.registry.write();
        if !current.contains(name) {
            return false;
        }
        let mut next = WorkerRegistry::clone(&current);
        next.unregister(name);
        *current = Arc::new(next);
        true
    }

    /// Descriptors of every registered worker, by name.
    pub fn workers(&self) -> Vec<WorkerDescriptor> {
        self.snapshot()
            .list_descriptors()
            .into_iter()
            .cloned()
            .collect()
    }

    fn snapshot(&self) -> Arc<WorkerRegistry> {
        Arc::clone(&self.registry.read())
    }

    /// Start the background task that evicts expired sessions.
    pub fn spawn_session_sweeper(&self) -> tokio::task::JoinHandle<()> {
        spawn_sweeper(
            Arc::clone(&self.sessions),
            self.config.session_sweep_interval(),
        )
    }

    /// Full session record, if it exists and has not expired.
    pub async fn get_session(&self, session_id: &str) -> EnsembleResult<Option<Session>> {
        self.sessions.get(session_id).await
    }

    pub async fn get_session_state(&self, session_id: &str) -> EnsembleResult<Option<SessionState>> {
        Ok(self.sessions.get(session_id).await?.map(|s| s.state))
    }

    /// Answer one query.
    ///
    /// Planner, worker, and synthesizer failures degrade the response instead
    /// of failing it. Only [`EnsembleError::Orchestration`] is returned, when
    /// nothing could be scheduled at all.
    #[instrument(skip(self, options), fields(session_id = tracing::field::Empty))]
    pub async fn process_query(
        &self,
        query: &str,
        options: QueryOptions,
    ) -> EnsembleResult<QueryResponse> {
        let started = Instant::now();
        let registry = self.snapshot();

        let outcome = self
            .run_query(query, options, registry, started)
            .await
            .map_err(|e| match e {
                EnsembleError::Orchestration(_) => e,
                other => EnsembleError::Orchestration(other.to_string()),
            });

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.metrics.record_query(outcome.is_ok(), elapsed_ms).await;
        match &outcome {
            Ok(response) => info!(
                session_id = %response.session_id,
                quality = %response.metadata.quality.synthesis_quality,
                elapsed_ms,
                "Query complete"
            ),
            Err(e) => error!(error = %e, elapsed_ms, "Query failed"),
        }
        outcome
    }

    async fn run_query(
        &self,
        query: &str,
        options: QueryOptions,
        registry: Arc<WorkerRegistry>,
        started: Instant,
    ) -> EnsembleResult<QueryResponse> {
        if query.trim().is_empty() {
            return Err(EnsembleError::Orchestration("query is empty".to_string()));
        }

        let context = options.context.unwrap_or(Value::Null);
        let mut session = Session::new(options.session_id, query, context);
        tracing::Span::current().record("session_id", session.id.as_str());
        self.sessions.create(&session).await?;
        let guard = AbandonGuard::new(Arc::clone(&self.sessions), &session.id);
        info!(session_id = %session.id, workers = registry.worker_count(), "Session started");

        let outcome = match self.drive(&mut session, registry, started).await {
            Ok(response) => Ok(response),
            Err(e) => {
                if !session.state.is_terminal() {
                    session.fail(&e)?;
                    self.sessions.update(&session).await?;
                }
                Err(e)
            }
        };
        guard.disarm();
        outcome
    }

    async fn drive(
        &self,
        session: &mut Session,
        registry: Arc<WorkerRegistry>,
        started: Instant,
    ) -> EnsembleResult<QueryResponse> {
        if registry.is_empty() {
            return Err(EnsembleError::Orchestration(
                "no workers registered".to_string(),
            ));
        }

        // Plan
        let graph = self.plan(session, &registry).await?;
        session.set_decomposition(graph.clone())?;
        self.sessions.update(session).await?;
        info!(
            session_id = %session.id,
            tasks = graph.tasks.len(),
            agents = ?graph.agents(),
            fallback = graph.fallback,
            "Decomposed"
        );

        // Schedule
        let waves = build_waves(&graph);
        if waves.is_empty() {
            return Err(EnsembleError::Orchestration(
                "decomposition produced no tasks".to_string(),
            ));
        }

        // Execute
        session.transition(SessionState::Executing)?;
        self.sessions.update(session).await?;
        let executor = Executor::new(Arc::clone(&registry), &self.config, Arc::clone(&self.metrics));
        let results = executor.run(&waves).await;
        for result in results.iter().filter(|r| !r.success) {
            if let Some(record) = &result.error {
                session.record_error(record.clone());
            }
        }
        session.append_results(results.iter().cloned());
        self.sessions.update(session).await?;
        info!(
            session_id = %session.id,
            results = results.len(),
            failed = results.iter().filter(|r| !r.success).count(),
            "Executed"
        );

        // Synthesize
        let aggregator = Aggregator::new(
            self.synthesizer.clone(),
            CategoryMap::new(&self.config.categories, &registry),
        );
        let aggregation = aggregator.aggregate(&session.request, &graph, &results).await;
        if aggregation.deterministic {
            self.metrics.record_deterministic_synthesis().await;
        }
        if let Some(e) = &aggregation.error {
            session.record_error(ErrorRecord::from(e));
        }
        session.set_synthesis(aggregation.output.clone())?;
        self.sessions.update(session).await?;

        let mut agents_used: Vec<String> = Vec::new();
        let mut failed_agents: Vec<String> = Vec::new();
        for result in &results {
            let bucket = if result.success {
                &mut agents_used
            } else {
                &mut failed_agents
            };
            if !bucket.contains(&result.agent) {
                bucket.push(result.agent.clone());
            }
        }

        let output = aggregation.output;
        Ok(QueryResponse {
            session_id: session.id.clone(),
            query: session.request.clone(),
            synthesis: output.synthesis,
            key_insights: output.key_insights,
            recommendations: output.recommendations,
            agent_contributions: output.agent_contributions,
            metadata: ResponseMetadata {
                quality: output.metadata,
                intent: graph.intent.clone(),
                complexity: graph.complexity,
                agents_used,
                failed_agents,
                conflicts: aggregation.conflicts,
                fallback_decomposition: graph.fallback,
                deterministic_synthesis: aggregation.deterministic,
                total_tokens: total_tokens(&results),
                processing_time_ms: started.elapsed().as_millis() as u64,
            },
            timestamp: Utc::now(),
        })
    }

    /// Ask the planner for a graph; any failure or invalid graph falls back to
    /// the keyword-matched single task.
    async fn plan(&self, session: &mut Session, registry: &WorkerRegistry) -> EnsembleResult<TaskGraph> {
        let context = planner_context(&session.context, registry);
        let planned = match self.planner.decompose(&session.request, &context).await {
            Ok(graph) => match graph::validate(&graph, registry) {
                Ok(()) => return Ok(graph),
                Err(e) => {
                    self.metrics.record_invalid_decomposition().await;
                    e
                }
            },
            Err(e) => e,
        };

        warn!(session_id = %session.id, error = %planned, "Planner failed, using fallback decomposition");
        session.record_error(ErrorRecord::from(&planned));
        self.metrics.record_fallback_decomposition().await;

        let descriptors = registry.list_descriptors();
        fallback_decomposition(
            &session.request,
            &descriptors,
            self.config.fallback_agent.as_deref(),
        )
    }

    /// Probe every registered worker, each bounded by `health_probe_timeout_ms`.
    pub async fn health_check(&self) -> HealthReport {
        let registry = self.snapshot();
        let timeout = self.config.health_probe_timeout();

        let mut probes = JoinSet::new();
        for (name, worker) in registry.iter() {
            let name = name.to_string();
            let worker = Arc::clone(worker);
            probes.spawn(async move {
                let health = match tokio::time::timeout(timeout, worker.health()).await {
                    Ok(health) => health,
                    Err(_) => WorkerHealth::unhealthy(format!(
                        "health probe timed out after {}ms",
                        timeout.as_millis()
                    )),
                };
                (name, health)
            });
        }

        let mut workers = BTreeMap::new();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((name, health)) => {
                    workers.insert(name, health);
                }
                Err(e) => warn!(error = %e, "Health probe panicked"),
            }
        }
        // A panicked probe counts as unhealthy.
        for name in registry.names() {
            workers
                .entry(name.to_string())
                .or_insert_with(|| WorkerHealth::unhealthy("health probe panicked"));
        }

        let total_workers = registry.worker_count();
        let healthy_workers = workers.values().filter(|h| h.healthy).count();
        let status = if total_workers == 0 || healthy_workers == 0 {
            HealthStatus::Unhealthy
        } else if healthy_workers < total_workers {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthReport {
            status,
            total_workers,
            healthy_workers,
            workers,
            timestamp: Utc::now(),
        }
    }
}

fn total_tokens(results: &[WorkerResult]) -> u64 {
    results
        .iter()
        .fold(0u64, |sum, r| sum.saturating_add(r.usage.total()))
}

/// Fails the session if the request flow is dropped before it finishes.
///
/// A caller that stops polling `process_query` would otherwise leave the
/// session non-terminal forever: never evicted, and its id never reusable.
struct AbandonGuard {
    sessions: Arc<dyn SessionStore>,
    session_id: String,
    armed: bool,
}

impl AbandonGuard {
    fn new(sessions: Arc<dyn SessionStore>, session_id: &str) -> Self {
        Self {
            sessions,
            session_id: session_id.to_string(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(session_id = %self.session_id, "Request abandoned outside a runtime, session left open");
            return;
        };
        let sessions = Arc::clone(&self.sessions);
        let session_id = std::mem::take(&mut self.session_id);
        runtime.spawn(mark_abandoned(sessions, session_id));
    }
}

async fn mark_abandoned(sessions: Arc<dyn SessionStore>, session_id: String) {
    let mut session = match sessions.get(&session_id).await {
        Ok(Some(session)) if !session.state.is_terminal() => session,
        Ok(_) => return,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Could not load abandoned session");
            return;
        }
    };
    let reason = EnsembleError::Orchestration("request abandoned before completion".to_string());
    let result = match session.fail(&reason) {
        Ok(()) => sessions.update(&session).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => warn!(session_id = %session_id, "Request abandoned, session marked failed"),
        Err(e) => warn!(session_id = %session_id, error = %e, "Could not fail abandoned session"),
    }
}

/// The caller's context with the registered workers listed under `availableAgents`.
fn planner_context(context: &Value, registry: &WorkerRegistry) -> Value {
    let mut map = match context {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("context".to_string(), other.clone());
            map
        }
    };
    let agents = serde_json::to_value(registry.list_descriptors()).unwrap_or(Value::Array(vec![]));
    map.insert(AVAILABLE_AGENTS_KEY.to_string(), agents);
    Value::Object(map)
}
