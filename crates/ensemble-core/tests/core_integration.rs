#![allow(clippy::unwrap_used, clippy::expect_used)]

use ensemble_core::*;

// ---------------------------------------------------------------------------
// 1. TaskGraph wire shape roundtrip
// ---------------------------------------------------------------------------

#[test]
fn task_graph_wire_shape_roundtrip() {
    let graph = TaskGraph::new(
        "music_recommendation",
        vec![
            Task::new("calendar", "Check tomorrow's schedule", 1).parallel(),
            Task::new("mood", "Estimate current stress", 1).parallel(),
            Task::new("music", "Pick a playlist", 2)
                .with_dependencies(["calendar", "mood"])
                .with_expected_output("ordered track list"),
        ],
    )
    .with_complexity(Complexity::Moderate)
    .with_reasoning("music depends on schedule and mood");

    let json = serde_json::to_value(&graph).unwrap();
    assert_eq!(json["tasks"][2]["expectedOutput"], "ordered track list");
    assert_eq!(json["tasks"][2]["dependencies"][1], "mood");
    assert_eq!(json["complexity"], "moderate");
    // Unset ids are not emitted.
    assert!(json["tasks"][0].get("id").is_none());

    let parsed: TaskGraph = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, graph);
}

// ---------------------------------------------------------------------------
// 2. Error Display and From impls
// ---------------------------------------------------------------------------

#[test]
fn error_display_and_from_impls() {
    let err = EnsembleError::Decomposition("no tasks".to_string());
    assert_eq!(err.to_string(), "Decomposition error: no tasks");

    let err = EnsembleError::Worker("exit status 1".to_string());
    assert_eq!(err.to_string(), "Worker error: exit status 1");

    let err = EnsembleError::Synthesis("empty synthesis".to_string());
    assert_eq!(err.to_string(), "Synthesis error: empty synthesis");

    let err = EnsembleError::Orchestration("no workers registered".to_string());
    assert_eq!(err.to_string(), "Orchestration error: no workers registered");

    let err = EnsembleError::Session("unknown session".to_string());
    assert_eq!(err.to_string(), "Session error: unknown session");

    let bad_json = serde_json::from_str::<serde_json::Value>("not json");
    let err: EnsembleError = bad_json.unwrap_err().into();
    assert!(err.to_string().starts_with("JSON error:"));

    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
    let err: EnsembleError = io_err.into();
    assert!(err.to_string().starts_with("IO error:"));
    assert_eq!(err.component(), "io");
}

// ---------------------------------------------------------------------------
// 3. WorkerResult preserves its error record through serialization
// ---------------------------------------------------------------------------

#[test]
fn worker_result_error_record_roundtrip() {
    let err = EnsembleError::WorkerTimeout {
        agent: "calendar".into(),
        timeout_ms: 30_000,
    };
    let result = WorkerResult {
        task: "calendar".into(),
        agent: "calendar".into(),
        priority: 1,
        success: false,
        output: String::new(),
        parsed: None,
        confidence: None,
        usage: Usage::default(),
        cost_usd: None,
        latency_ms: 30_001,
        timestamp: chrono::Utc::now(),
        attempts: 2,
        timed_out: true,
        error: Some(ErrorRecord::from(&err)),
    };

    let json = serde_json::to_string(&result).unwrap();
    let back: WorkerResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back.error_message(), Some("Worker 'calendar' timed out after 30000ms"));
    assert_eq!(back.error.as_ref().unwrap().component, "executor");
    assert_eq!(back.attempts, 2);
    assert!(back.timed_out);
}
