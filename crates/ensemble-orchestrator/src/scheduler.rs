use ensemble_core::{Task, TaskGraph};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the tasks of a wave run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveKind {
    Parallel,
    Sequential,
}

impl std::fmt::Display for WaveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaveKind::Parallel => write!(f, "parallel"),
            WaveKind::Sequential => write!(f, "sequential"),
        }
    }
}

/// A batch of tasks that settles completely before the next wave starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionWave {
    pub kind: WaveKind,
    pub priority: u32,
    pub tasks: Vec<Task>,
}

/// Group a validated graph into waves.
///
/// Priorities run in ascending order. Within one priority, every
/// parallel-flagged task lands in a single parallel wave, emitted first; each
/// remaining task gets its own sequential wave in declaration order.
pub fn build_waves(graph: &TaskGraph) -> Vec<ExecutionWave> {
    let mut by_priority: BTreeMap<u32, Vec<&Task>> = BTreeMap::new();
    for task in &graph.tasks {
        by_priority.entry(task.priority).or_default().push(task);
    }

    let mut waves = Vec::new();
    for (priority, tasks) in by_priority {
        let (parallel, sequential): (Vec<&Task>, Vec<&Task>) =
            tasks.into_iter().partition(|t| t.parallel);

        if !parallel.is_empty() {
            waves.push(ExecutionWave {
                kind: WaveKind::Parallel,
                priority,
                tasks: parallel.into_iter().cloned().collect(),
            });
        }
        for task in sequential {
            waves.push(ExecutionWave {
                kind: WaveKind::Sequential,
                priority,
                tasks: vec![task.clone()],
            });
        }
    }
    waves
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(wave: &ExecutionWave) -> Vec<&str> {
        wave.tasks.iter().map(|t| t.name()).collect()
    }

    #[test]
    fn test_music_before_presentation_shape() {
        let graph = TaskGraph::new(
            "music_recommendation",
            vec![
                Task::new("calendar", "upcoming events", 1).parallel(),
                Task::new("health", "sleep and stress", 1).parallel(),
                Task::new("music", "recommend tracks", 2)
                    .with_dependencies(["calendar", "health"]),
            ],
        );
        let waves = build_waves(&graph);
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0].kind, WaveKind::Parallel);
        assert_eq!(names(&waves[0]), vec!["calendar", "health"]);
        assert_eq!(waves[1].kind, WaveKind::Sequential);
        assert_eq!(waves[1].priority, 2);
        assert_eq!(names(&waves[1]), vec!["music"]);
    }

    #[test]
    fn test_same_priority_sequential_tasks_keep_declaration_order() {
        let graph = TaskGraph::new(
            "x",
            vec![
                Task::new("c", "", 1),
                Task::new("a", "", 1).parallel(),
                Task::new("b", "", 1),
                Task::new("d", "", 1).parallel(),
            ],
        );
        let waves = build_waves(&graph);
        let shape: Vec<(WaveKind, Vec<&str>)> =
            waves.iter().map(|w| (w.kind, names(w))).collect();
        assert_eq!(
            shape,
            vec![
                (WaveKind::Parallel, vec!["a", "d"]),
                (WaveKind::Sequential, vec!["c"]),
                (WaveKind::Sequential, vec!["b"]),
            ]
        );
    }

    #[test]
    fn test_priorities_non_decreasing_and_each_task_once() {
        let graph = TaskGraph::new(
            "x",
            vec![
                Task::new("e", "", 3),
                Task::new("a", "", 1).parallel(),
                Task::new("c", "", 2).parallel(),
                Task::new("b", "", 1),
                Task::new("d", "", 2).parallel(),
                Task::new("f", "", 10).parallel(),
            ],
        );
        let waves = build_waves(&graph);
        assert!(waves.windows(2).all(|w| w[0].priority <= w[1].priority));

        let mut seen: Vec<&str> = waves.iter().flat_map(names).collect();
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c", "d", "e", "f"]);

        // A parallel wave of one is still a parallel wave.
        assert_eq!(waves.last().map(|w| w.kind), Some(WaveKind::Parallel));
    }

    #[test]
    fn test_empty_graph_has_no_waves() {
        assert!(build_waves(&TaskGraph::new("x", vec![])).is_empty());
    }
}
