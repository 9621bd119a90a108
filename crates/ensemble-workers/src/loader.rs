use crate::command::CommandWorker;
use crate::registry::WorkerRegistry;
use crate::static_worker::StaticWorker;
use crate::worker::{Worker, WorkerDescriptor};
use ensemble_core::{EnsembleError, EnsembleResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Worker entry from the TOML configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(flatten)]
    pub kind: WorkerKind,
}

/// How a configured worker is backed.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WorkerKind {
    /// Fixed response template (`{prompt}` is substituted).
    Static { response: String },
    /// External program; prompt on stdin, stdout as output.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        working_dir: Option<PathBuf>,
    },
}

impl WorkerConfig {
    fn descriptor(&self) -> WorkerDescriptor {
        let mut descriptor = WorkerDescriptor::new(&self.name, &self.description)
            .with_keywords(self.keywords.iter().map(String::as_str));
        descriptor.category = self.category.clone();
        descriptor
    }

    /// Build the worker this entry describes. Relative working directories
    /// resolve against `base_dir` (the config file's directory).
    pub fn build(&self, base_dir: &Path) -> EnsembleResult<Arc<dyn Worker>> {
        if self.name.trim().is_empty() {
            return Err(EnsembleError::Config("worker name must not be empty".into()));
        }
        let worker: Arc<dyn Worker> = match &self.kind {
            WorkerKind::Static { response } => {
                Arc::new(StaticWorker::new(self.descriptor(), response.clone()))
            }
            WorkerKind::Command {
                program,
                args,
                working_dir,
            } => {
                if program.trim().is_empty() {
                    return Err(EnsembleError::Config(format!(
                        "worker '{}' has an empty program",
                        self.name
                    )));
                }
                let mut worker =
                    CommandWorker::new(self.descriptor(), program.clone()).with_args(args.clone());
                if let Some(dir) = working_dir {
                    worker = worker.with_working_dir(base_dir.join(dir));
                }
                Arc::new(worker)
            }
        };
        Ok(worker)
    }
}

/// Load every configured worker into the registry, skipping invalid entries.
///
/// Returns the number of workers loaded.
pub fn load_all(configs: &[WorkerConfig], base_dir: &Path, registry: &mut WorkerRegistry) -> usize {
    let mut loaded = 0;

    for config in configs {
        match config.build(base_dir) {
            Ok(worker) => {
                info!(worker = %config.name, "Loaded worker");
                registry.register(worker);
                loaded += 1;
            }
            Err(e) => {
                warn!(worker = %config.name, error = %e, "Failed to load worker, skipping");
            }
        }
    }

    loaded
}
