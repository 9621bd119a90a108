use ensemble_core::{
    EnsembleError, QualityMetadata, SynthesisOutput, SynthesisQuality, Task, TaskGraph, Usage,
    WorkerResult,
};
use ensemble_session::{InMemorySessionStore, Session, SessionState, SessionStore};
use std::sync::Arc;
use std::time::Duration;

fn result(agent: &str) -> WorkerResult {
    WorkerResult {
        task: agent.to_string(),
        agent: agent.to_string(),
        priority: 1,
        success: true,
        output: format!("{agent} done"),
        parsed: None,
        confidence: Some(0.8),
        usage: Usage::new(10, 20),
        cost_usd: None,
        latency_ms: 5,
        timestamp: chrono::Utc::now(),
        attempts: 1,
        timed_out: false,
        error: None,
    }
}

#[tokio::test]
async fn test_full_lifecycle_through_store() {
    let store = InMemorySessionStore::default();
    let mut session = Session::new(None, "plan my evening", serde_json::json!({"tz": "UTC"}));
    let id = session.id.clone();
    store.create(&session).await.unwrap();

    session
        .set_decomposition(TaskGraph::new(
            "evening",
            vec![Task::new("music", "pick tracks", 1)],
        ))
        .unwrap();
    store.update(&session).await.unwrap();

    session.transition(SessionState::Executing).unwrap();
    session.append_results(vec![result("music")]);
    store.update(&session).await.unwrap();

    session
        .set_synthesis(SynthesisOutput {
            synthesis: "Calm jazz tonight.".into(),
            key_insights: vec![],
            recommendations: vec![],
            agent_contributions: Default::default(),
            metadata: QualityMetadata {
                total_agents: 1,
                synthesis_quality: SynthesisQuality::Low,
                conflicts_resolved: 0,
            },
        })
        .unwrap();
    store.update(&session).await.unwrap();

    let loaded = store.get(&id).await.unwrap().unwrap();
    assert_eq!(loaded.state, SessionState::Synthesized);
    assert_eq!(loaded.results.len(), 1);
    assert_eq!(loaded.context["tz"], "UTC");
    assert!(loaded.completed_at.is_some());
    assert_eq!(
        loaded.synthesis.unwrap().synthesis,
        "Calm jazz tonight."
    );
}

#[tokio::test]
async fn test_get_nonexistent_returns_none() {
    let store = InMemorySessionStore::default();
    assert!(store.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_and_list() {
    let store = InMemorySessionStore::default();
    for id in ["b", "a", "c"] {
        store
            .create(&Session::new(Some(id.into()), "q", serde_json::Value::Null))
            .await
            .unwrap();
    }
    assert_eq!(store.list().await.unwrap(), vec!["a", "b", "c"]);

    store.delete("b").await.unwrap();
    assert_eq!(store.list().await.unwrap(), vec!["a", "c"]);
    // Deleting twice is fine.
    store.delete("b").await.unwrap();
}

#[tokio::test]
async fn test_illegal_transition_leaves_stored_copy_untouched() {
    let store = InMemorySessionStore::default();
    let mut session = Session::new(Some("s".into()), "q", serde_json::Value::Null);
    store.create(&session).await.unwrap();

    assert!(session.transition(SessionState::Synthesized).is_err());
    session
        .fail(&EnsembleError::Decomposition("planner down".into()))
        .unwrap();
    store.update(&session).await.unwrap();

    let loaded = store.get("s").await.unwrap().unwrap();
    assert_eq!(loaded.state, SessionState::Failed);
    assert_eq!(loaded.errors[0].component, "planner");
}

#[tokio::test]
async fn test_concurrent_sessions_do_not_interfere() {
    let store = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
    let mut handles = Vec::new();
    for i in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let mut session = Session::new(Some(format!("s{i}")), "q", serde_json::Value::Null);
            store.create(&session).await.unwrap();
            session
                .set_decomposition(TaskGraph::new("x", vec![Task::new("a", "b", 1)]))
                .unwrap();
            session.transition(SessionState::Executing).unwrap();
            session.append_results(vec![result(&format!("agent{i}"))]);
            store.update(&session).await.unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(store.list().await.unwrap().len(), 16);
    let s3 = store.get("s3").await.unwrap().unwrap();
    assert_eq!(s3.results[0].agent, "agent3");
}
