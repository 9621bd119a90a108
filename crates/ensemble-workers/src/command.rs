use crate::worker::{InvokeOptions, Worker, WorkerDescriptor, WorkerHealth, WorkerOutput};
use async_trait::async_trait;
use ensemble_core::{EnsembleError, EnsembleResult};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const MAX_STDERR_CHARS: usize = 2_000;

/// A worker backed by an external program.
///
/// The assembled task input is written to the program's stdin and its stdout
/// becomes the worker output. A non-zero exit is a worker error. The child is
/// killed when the invocation is cancelled or its future is dropped on deadline.
pub struct CommandWorker {
    descriptor: WorkerDescriptor,
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandWorker {
    pub fn new(descriptor: WorkerDescriptor, program: impl Into<String>) -> Self {
        Self {
            descriptor,
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    async fn run(&self, prompt: &str) -> EnsembleResult<WorkerOutput> {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            EnsembleError::Worker(format!("failed to start '{}': {e}", self.program))
        })?;

        // Stdin is fed while stdout drains; a prompt larger than the pipe
        // buffer would otherwise block both sides.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A program that ignores stdin may close it early; that is not a failure.
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    debug!(worker = %self.descriptor.name, error = %e, "stdin closed early");
                }
            }
        };
        let ((), output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.chars().take(MAX_STDERR_CHARS).collect();
            return Err(EnsembleError::Worker(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(WorkerOutput {
            raw: serde_json::json!({ "exit_code": output.status.code() }),
            ..WorkerOutput::text(text)
        })
    }
}

#[async_trait]
impl Worker for CommandWorker {
    fn descriptor(&self) -> &WorkerDescriptor {
        &self.descriptor
    }

    async fn execute(&self, prompt: &str, options: &InvokeOptions) -> EnsembleResult<WorkerOutput> {
        tokio::select! {
            result = self.run(prompt) => result,
            _ = options.cancel.cancelled() => {
                warn!(worker = %self.descriptor.name, task = %options.task, "Command cancelled");
                Err(EnsembleError::Worker(format!("'{}' cancelled", self.program)))
            }
        }
    }

    async fn health(&self) -> WorkerHealth {
        match which::which(&self.program) {
            Ok(_) => WorkerHealth::healthy(),
            Err(e) => WorkerHealth::unhealthy(format!("program '{}' not found: {e}", self.program)),
        }
    }
}
