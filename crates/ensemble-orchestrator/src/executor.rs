use crate::config::OrchestratorConfig;
use crate::context::{ContextBuilder, TaskInput};
use crate::monitor::MetricsCollector;
use crate::parse::parse_output;
use crate::scheduler::{ExecutionWave, WaveKind};
use chrono::Utc;
use ensemble_core::{EnsembleError, ErrorRecord, Task, WorkerResult};
use ensemble_workers::{InvokeOptions, WorkerOutput, WorkerRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Runs scheduled waves against one registry snapshot.
///
/// Each task runs in its own tokio task, so a failing or panicking worker
/// never takes its siblings down. At most `max_parallel_agents` invocations of
/// this executor are in flight at once.
#[derive(Clone)]
pub struct Executor {
    registry: Arc<WorkerRegistry>,
    metrics: Arc<MetricsCollector>,
    permits: Arc<Semaphore>,
    timeout: Duration,
    retry_budget: u32,
}

impl Executor {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        config: &OrchestratorConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            registry,
            metrics,
            permits: Arc::new(Semaphore::new(config.max_parallel_agents.max(1))),
            timeout: config.agent_timeout(),
            retry_budget: config.retry_budget(),
        }
    }

    /// Run every wave in order and return the result log.
    ///
    /// A wave starts only after the previous one has fully settled, whatever
    /// its outcome.
    pub async fn run(&self, waves: &[ExecutionWave]) -> Vec<WorkerResult> {
        let mut log = Vec::new();
        for (index, wave) in waves.iter().enumerate() {
            info!(
                wave = index + 1,
                kind = %wave.kind,
                priority = wave.priority,
                tasks = wave.tasks.len(),
                "Executing wave"
            );
            self.run_wave(wave, &mut log).await;
        }
        log
    }

    /// Run one wave, appending its results to `log` in completion order.
    pub async fn run_wave(&self, wave: &ExecutionWave, log: &mut Vec<WorkerResult>) {
        match wave.kind {
            WaveKind::Parallel => self.run_batch(&wave.tasks, log).await,
            WaveKind::Sequential => {
                for task in &wave.tasks {
                    self.run_batch(std::slice::from_ref(task), log).await;
                }
            }
        }
    }

    /// Launch `tasks` together and wait for all of them to settle.
    async fn run_batch(&self, tasks: &[Task], log: &mut Vec<WorkerResult>) {
        let mut set = JoinSet::new();
        let mut launched: HashMap<tokio::task::Id, Task> = HashMap::new();

        for task in tasks {
            let input = ContextBuilder::new(log.as_slice()).build(task);
            if !input.omitted.is_empty() {
                debug!(
                    task = %task.name(),
                    omitted = ?input.omitted,
                    "Running without failed or missing dependencies"
                );
            }
            let executor = self.clone();
            let owned = task.clone();
            let handle = set.spawn(async move { executor.run_task(&owned, &input).await });
            launched.insert(handle.id(), task.clone());
        }

        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((_, result)) => log.push(result),
                Err(e) => {
                    let Some(task) = launched.get(&e.id()) else {
                        continue;
                    };
                    warn!(task = %task.name(), agent = %task.agent, error = %e, "Worker task panicked");
                    self.metrics.record_failure(&task.agent, 0).await;
                    let error = EnsembleError::Worker(format!("worker '{}' panicked", task.agent));
                    log.push(failed_result(task, &error, 1, 0));
                }
            }
        }
    }

    /// Invoke the task's worker with deadline and bounded retry.
    ///
    /// `input` is reused unchanged for every attempt.
    #[instrument(skip_all, fields(task = %task.name(), agent = %task.agent))]
    pub async fn run_task(&self, task: &Task, input: &TaskInput) -> WorkerResult {
        let Some(worker) = self.registry.get(&task.agent).cloned() else {
            let error = EnsembleError::Worker(format!("no worker named '{}' is registered", task.agent));
            warn!(task = %task.name(), agent = %task.agent, "Worker not registered");
            self.metrics.record_failure(&task.agent, 0).await;
            return failed_result(task, &error, 0, 0);
        };

        let _permit = self.permits.acquire().await.ok();
        let started = Instant::now();
        let mut retries = 0u32;

        loop {
            let attempt = retries + 1;
            let options = InvokeOptions {
                task: task.name().to_string(),
                timeout: self.timeout,
                attempt,
                cancel: CancellationToken::new(),
            };
            self.metrics.record_invocation(&task.agent).await;

            let outcome =
                match tokio::time::timeout(self.timeout, worker.execute(&input.prompt, &options))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        options.cancel.cancel();
                        Err(EnsembleError::WorkerTimeout {
                            agent: task.agent.clone(),
                            timeout_ms: self.timeout.as_millis() as u64,
                        })
                    }
                };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            match outcome {
                Ok(output) => {
                    self.metrics
                        .record_success(&task.agent, output.usage.total(), elapsed_ms)
                        .await;
                    debug!(task = %task.name(), agent = %task.agent, attempt, elapsed_ms, "Task succeeded");
                    return success_result(task, output, attempt, elapsed_ms);
                }
                Err(e) => {
                    if e.is_timeout() {
                        self.metrics.record_timeout(&task.agent).await;
                    }
                    if retries < self.retry_budget {
                        retries += 1;
                        self.metrics.record_retry(&task.agent).await;
                        warn!(
                            task = %task.name(),
                            agent = %task.agent,
                            attempt = retries + 1,
                            error = %e,
                            "Retrying task"
                        );
                        continue;
                    }
                    warn!(task = %task.name(), agent = %task.agent, attempts = attempt, error = %e, "Task failed");
                    self.metrics.record_failure(&task.agent, elapsed_ms).await;
                    return failed_result(task, &e, attempt, elapsed_ms);
                }
            }
        }
    }
}

fn success_result(task: &Task, output: WorkerOutput, attempts: u32, latency_ms: u64) -> WorkerResult {
    let parsed = parse_output(&output.text);
    WorkerResult {
        task: task.name().to_string(),
        agent: task.agent.clone(),
        priority: task.priority,
        success: true,
        output: output.text,
        parsed: parsed.parsed,
        confidence: parsed.confidence,
        usage: output.usage,
        cost_usd: output.cost_usd,
        latency_ms,
        timestamp: Utc::now(),
        attempts,
        timed_out: false,
        error: None,
    }
}

fn failed_result(task: &Task, error: &EnsembleError, attempts: u32, latency_ms: u64) -> WorkerResult {
    WorkerResult {
        task: task.name().to_string(),
        agent: task.agent.clone(),
        priority: task.priority,
        success: false,
        output: String::new(),
        parsed: None,
        confidence: None,
        usage: Default::default(),
        cost_usd: None,
        latency_ms,
        timestamp: Utc::now(),
        attempts,
        timed_out: error.is_timeout(),
        error: Some(ErrorRecord::new(task.agent.clone(), error.to_string())),
    }
}
