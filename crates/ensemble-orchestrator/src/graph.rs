use ensemble_core::{EnsembleError, EnsembleResult, TaskGraph};
use ensemble_workers::WorkerRegistry;
use std::collections::HashMap;

/// Check a planner's graph against the registry before it is scheduled.
///
/// All violations are collected into one [`EnsembleError::Decomposition`].
pub fn validate(graph: &TaskGraph, registry: &WorkerRegistry) -> EnsembleResult<()> {
    let problems = violations(graph, registry);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(EnsembleError::Decomposition(format!(
            "invalid task graph: {}",
            problems.join("; ")
        )))
    }
}

/// Every structural problem in `graph`, in declaration order.
///
/// Requiring each dependency to sit at a strictly lower priority also rules
/// out cycles, so no separate cycle search is needed.
pub fn violations(graph: &TaskGraph, registry: &WorkerRegistry) -> Vec<String> {
    let mut problems = Vec::new();
    if graph.tasks.is_empty() {
        problems.push("graph has no tasks".to_string());
        return problems;
    }

    let mut by_name: HashMap<&str, u32> = HashMap::new();
    for task in &graph.tasks {
        if by_name.insert(task.name(), task.priority).is_some() {
            problems.push(format!("duplicate task name '{}'", task.name()));
        }
    }

    for task in &graph.tasks {
        let name = task.name();
        if task.priority == 0 {
            problems.push(format!("task '{name}' has priority 0"));
        }
        if !registry.contains(&task.agent) {
            problems.push(format!("task '{name}' uses unknown agent '{}'", task.agent));
        }
        for dep in &task.dependencies {
            if dep == name {
                problems.push(format!("task '{name}' depends on itself"));
                continue;
            }
            match by_name.get(dep.as_str()) {
                None => problems.push(format!("task '{name}' depends on unknown task '{dep}'")),
                Some(&dep_priority) if dep_priority >= task.priority => problems.push(format!(
                    "task '{name}' (priority {}) depends on '{dep}' (priority {dep_priority})",
                    task.priority
                )),
                Some(_) => {}
            }
        }
    }

    problems
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use ensemble_core::Task;
    use ensemble_workers::{StaticWorker, WorkerDescriptor};
    use std::sync::Arc;

    fn registry() -> WorkerRegistry {
        let mut registry = WorkerRegistry::new();
        for name in ["calendar", "health", "music"] {
            registry.register(Arc::new(StaticWorker::new(
                WorkerDescriptor::new(name, name),
                "ok",
            )));
        }
        registry
    }

    #[test]
    fn test_valid_graph_passes() {
        let graph = TaskGraph::new(
            "music",
            vec![
                Task::new("calendar", "schedule", 1).parallel(),
                Task::new("health", "sleep data", 1).parallel(),
                Task::new("music", "pick", 2).with_dependencies(["calendar", "health"]),
            ],
        );
        assert!(validate(&graph, &registry()).is_ok());
    }

    #[test]
    fn test_dependency_must_have_lower_priority() {
        let graph = TaskGraph::new(
            "x",
            vec![
                Task::new("calendar", "a", 2),
                Task::new("music", "b", 2).with_dependencies(["calendar"]),
            ],
        );
        let problems = violations(&graph, &registry());
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("depends on 'calendar' (priority 2)"));
    }

    #[test]
    fn test_mutual_dependency_is_rejected() {
        let graph = TaskGraph::new(
            "x",
            vec![
                Task::new("calendar", "a", 1).with_dependencies(["music"]),
                Task::new("music", "b", 2).with_dependencies(["calendar"]),
            ],
        );
        assert_eq!(violations(&graph, &registry()).len(), 1);
    }

    #[test]
    fn test_all_violations_reported() {
        let graph = TaskGraph::new(
            "x",
            vec![
                Task::new("ghost", "a", 0),
                Task::new("music", "b", 1).with_dependencies(["music", "nowhere"]),
                Task::new("music", "c", 2),
            ],
        );
        let err = validate(&graph, &registry()).unwrap_err().to_string();
        assert!(err.contains("duplicate task name 'music'"));
        assert!(err.contains("priority 0"));
        assert!(err.contains("unknown agent 'ghost'"));
        assert!(err.contains("depends on itself"));
        assert!(err.contains("unknown task 'nowhere'"));
    }

    #[test]
    fn test_empty_graph_rejected() {
        let graph = TaskGraph::new("x", vec![]);
        assert_eq!(violations(&graph, &registry()), vec!["graph has no tasks"]);
    }

    #[test]
    fn test_task_ids_disambiguate_same_agent() {
        let graph = TaskGraph::new(
            "x",
            vec![
                Task::new("music", "a", 1).with_id("draft"),
                Task::new("music", "b", 2)
                    .with_id("final")
                    .with_dependencies(["draft"]),
            ],
        );
        assert!(validate(&graph, &registry()).is_ok());
    }
}
