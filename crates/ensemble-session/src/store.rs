use crate::session::Session;
use async_trait::async_trait;
use chrono::Utc;
use ensemble_core::{EnsembleError, EnsembleResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Storage for request sessions, shared by every concurrent request flow.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session. Fails if a session with the same id is still in progress.
    async fn create(&self, session: &Session) -> EnsembleResult<()>;
    /// Fetch a snapshot; expired sessions are reported as absent.
    async fn get(&self, id: &str) -> EnsembleResult<Option<Session>>;
    /// Overwrite an existing session.
    async fn update(&self, session: &Session) -> EnsembleResult<()>;
    async fn delete(&self, id: &str) -> EnsembleResult<()>;
    async fn list(&self) -> EnsembleResult<Vec<String>>;
    /// Remove every session whose retention window has passed. Returns how many were removed.
    async fn evict_expired(&self) -> EnsembleResult<usize>;
}

/// Spawn a background task that calls [`SessionStore::evict_expired`] every `interval`.
///
/// Returns the [`tokio::task::JoinHandle`] so the caller can abort it on shutdown.
pub fn spawn_sweeper(store: Arc<dyn SessionStore>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.evict_expired().await {
                Ok(0) => {}
                Ok(evicted) => info!(evicted, "Session sweeper evicted expired sessions"),
                Err(e) => debug!(error = %e, "Session sweep failed"),
            }
        }
    })
}

/// Process-memory session store with a fixed retention window after completion.
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: chrono::Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Number of sessions physically held, expired or not.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: &Session) -> EnsembleResult<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&session.id) {
            if !existing.state.is_terminal() {
                return Err(EnsembleError::Session(format!(
                    "session {} is already in progress ({})",
                    session.id, existing.state
                )));
            }
            debug!(session_id = %session.id, "Replacing completed session");
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> EnsembleResult<Option<Session>> {
        let sessions = self.sessions.read().await;
        let now = Utc::now();
        Ok(sessions
            .get(id)
            .filter(|s| !s.is_expired(now, self.ttl))
            .cloned())
    }

    async fn update(&self, session: &Session) -> EnsembleResult<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some(slot) => {
                *slot = session.clone();
                Ok(())
            }
            None => Err(EnsembleError::Session(format!(
                "session {} not found",
                session.id
            ))),
        }
    }

    async fn delete(&self, id: &str) -> EnsembleResult<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn list(&self) -> EnsembleResult<Vec<String>> {
        let sessions = self.sessions.read().await;
        let now = Utc::now();
        let mut ids: Vec<String> = sessions
            .values()
            .filter(|s| !s.is_expired(now, self.ttl))
            .map(|s| s.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn evict_expired(&self) -> EnsembleResult<usize> {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now, self.ttl));
        Ok(before - sessions.len())
    }
}
