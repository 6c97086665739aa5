//! Conversation sessions: one retention store per session, keyed by id.
//!
//! A session is owned by whoever holds its lock; the agent loop keeps the lock for
//! a whole turn so entries from one turn are never interleaved with another's.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::retention::{RetentionError, RetentionMode, RetentionStore, TurnEntry};

/// Unique session identifier (opaque string).
pub type SessionId = String;

/// A session: id, its retention store, and the number of turns run so far.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    retention: Box<dyn RetentionStore>,
    turns: u64,
}

impl Session {
    pub fn new(id: impl Into<SessionId>, mode: RetentionMode) -> Result<Self, RetentionError> {
        Ok(Self {
            id: id.into(),
            retention: mode.build()?,
            turns: 0,
        })
    }

    pub fn mode(&self) -> RetentionMode {
        self.retention.mode()
    }

    /// Turns started so far.
    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// Start a new turn and return its index (1-based).
    pub fn begin_turn(&mut self) -> u64 {
        self.turns += 1;
        self.turns
    }

    pub fn history(&self) -> Vec<TurnEntry> {
        self.retention.snapshot()
    }

    pub fn record(&mut self, entries: Vec<TurnEntry>) {
        self.retention.append(entries);
    }

    /// Drop retained history. The mode and turn counter are kept.
    pub fn clear(&mut self) {
        self.retention.clear();
    }
}

/// In-memory store for sessions (create, get, remove).
pub struct SessionStore {
    mode: RetentionMode,
    inner: Arc<RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(RetentionMode::default())
    }
}

impl SessionStore {
    /// New sessions get `mode` as their retention policy.
    pub fn new(mode: RetentionMode) -> Self {
        Self {
            mode,
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn mode(&self) -> RetentionMode {
        self.mode
    }

    /// Create a new session with a generated id; returns the session id.
    pub async fn create(&self) -> Result<SessionId, RetentionError> {
        let id = format!("sess-{}", uuid::Uuid::new_v4());
        let session = Session::new(id.clone(), self.mode)?;
        self.inner
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        Ok(id)
    }

    /// Return the session with the given id, creating it if it does not exist.
    pub async fn get_or_create(
        &self,
        id: impl Into<SessionId>,
    ) -> Result<Arc<Mutex<Session>>, RetentionError> {
        let id = id.into();
        if let Some(s) = self.inner.read().await.get(&id) {
            return Ok(s.clone());
        }
        let mut g = self.inner.write().await;
        if let Some(s) = g.get(&id) {
            return Ok(s.clone());
        }
        let session = Arc::new(Mutex::new(Session::new(id.clone(), self.mode)?));
        g.insert(id, session.clone());
        Ok(session)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.inner.read().await.get(id).cloned()
    }

    /// End a session; its history is dropped with it.
    pub async fn remove(&self, id: &str) -> bool {
        self.inner.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
