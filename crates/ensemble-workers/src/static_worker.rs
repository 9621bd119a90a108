use crate::worker::{InvokeOptions, Worker, WorkerDescriptor, WorkerOutput};
use async_trait::async_trait;
use ensemble_core::EnsembleResult;

/// A worker that answers every prompt with a fixed template.
///
/// `{prompt}` in the template is replaced with the assembled task input, which
/// makes it useful for dry runs of a decomposition without real back-ends.
pub struct StaticWorker {
    descriptor: WorkerDescriptor,
    template: String,
}

impl StaticWorker {
    pub fn new(descriptor: WorkerDescriptor, template: impl Into<String>) -> Self {
        Self {
            descriptor,
            template: template.into(),
        }
    }
}

#[async_trait]
impl Worker for StaticWorker {
    fn descriptor(&self) -> &WorkerDescriptor {
        &self.descriptor
    }

    async fn execute(&self, prompt: &str, _options: &InvokeOptions) -> EnsembleResult<WorkerOutput> {
        Ok(WorkerOutput::text(self.template.replace("{prompt}", prompt)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_template_substitution() {
        let worker = StaticWorker::new(
            WorkerDescriptor::new("echo", "echoes"),
            "You asked: {prompt}",
        );
        let opts = InvokeOptions::new("echo", Duration::from_secs(1));
        let out = worker.execute("calm music", &opts).await.unwrap();
        assert_eq!(out.text, "You asked: calm music");
        assert_eq!(out.usage.total(), 0);
        assert!(worker.health().await.healthy);
    }
}
