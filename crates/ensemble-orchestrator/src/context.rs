use ensemble_core::{Task, WorkerResult};
use std::fmt::Write;

/// The assembled input for one task, built once and reused across retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInput {
    pub prompt: String,
    /// Dependencies whose output was folded into the prompt.
    pub included: Vec<String>,
    /// Dependencies that failed or never ran.
    pub omitted: Vec<String>,
}

/// Builds task input from the result log so far.
pub struct ContextBuilder<'a> {
    log: &'a [WorkerResult],
}

impl<'a> ContextBuilder<'a> {
    pub fn new(log: &'a [WorkerResult]) -> Self {
        Self { log }
    }

    /// Merge the task's objective with the output of each successful dependency.
    ///
    /// A failed or missing dependency is left out of the prompt and listed in
    /// [`TaskInput::omitted`]; it never blocks the task.
    pub fn build(&self, task: &Task) -> TaskInput {
        let mut prompt = format!("Objective: {}", task.objective);
        if !task.expected_output.is_empty() {
            let _ = write!(prompt, "\nExpected output: {}", task.expected_output);
        }

        let mut included = Vec::new();
        let mut omitted = Vec::new();
        let mut sections = String::new();

        for dep in &task.dependencies {
            match self.successful(dep) {
                Some(result) => {
                    let _ = write!(
                        sections,
                        "\n\n### {} ({})\n{}",
                        dep,
                        result.agent,
                        result.output.trim()
                    );
                    included.push(dep.clone());
                }
                None => omitted.push(dep.clone()),
            }
        }

        if !sections.is_empty() {
            prompt.push_str("\n\nContext from upstream tasks:");
            prompt.push_str(&sections);
        }

        TaskInput {
            prompt,
            included,
            omitted,
        }
    }

    fn successful(&self, task_name: &str) -> Option<&WorkerResult> {
        self.log
            .iter()
            .rev()
            .find(|r| r.task == task_name && r.success)
    }
}
