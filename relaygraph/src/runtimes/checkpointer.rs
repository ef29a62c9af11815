//! Pluggable thread-keyed persistence for session state.
//!
//! A checkpoint is written after every successfully completed step (and
//! at suspension points), so a retried invocation resumes from before
//! the failure, never mid-node.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::state::VersionedState;
use crate::types::NodeKind;

use super::runner::{PendingInterrupt, SessionState};

/// Which persistence backend a runner should use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckpointerType {
    InMemory,
    #[cfg(feature = "sqlite")]
    SQLite,
}

/// Snapshot of everything needed to resume a thread.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub session_id: String,
    pub step: u64,
    pub state: VersionedState,
    pub frontier: Vec<NodeKind>,
    pub pending_interrupt: Option<PendingInterrupt>,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn from_session(session_id: &str, session: &SessionState) -> Self {
        Self {
            session_id: session_id.to_string(),
            step: session.step,
            state: session.state.clone(),
            frontier: session.frontier.clone(),
            pending_interrupt: session.pending_interrupt.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Rebuild in-memory session state from a stored checkpoint.
pub fn restore_session_state(checkpoint: &Checkpoint) -> SessionState {
    SessionState {
        state: checkpoint.state.clone(),
        step: checkpoint.step,
        frontier: checkpoint.frontier.clone(),
        pending_interrupt: checkpoint.pending_interrupt.clone(),
        resume: None,
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointerError {
    #[error("checkpoint backend error: {0}")]
    #[diagnostic(code(relaygraph::checkpointer::backend))]
    Backend(String),

    #[error("checkpoint serialization failed: {0}")]
    #[diagnostic(code(relaygraph::checkpointer::serde))]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CheckpointerError>;

/// Thread-keyed checkpoint store.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Persist the latest checkpoint for its session.
    async fn save(&self, checkpoint: Checkpoint) -> Result<()>;

    /// Load the most recent checkpoint for a session, if any.
    async fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint>>;
}

/// Volatile store for tests and development.
#[derive(Default)]
pub struct InMemoryCheckpointer {
    inner: RwLock<FxHashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        self.inner
            .write()
            .insert(checkpoint.session_id.clone(), checkpoint);
        Ok(())
    }

    async fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.inner.read().get(session_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_round_trip() {
        let store = InMemoryCheckpointer::new();
        let session = SessionState {
            state: VersionedState::new_with_user_message("hi"),
            step: 3,
            frontier: vec![NodeKind::Custom("router".into())],
            pending_interrupt: None,
            resume: None,
        };
        store
            .save(Checkpoint::from_session("t1", &session))
            .await
            .unwrap();

        let loaded = store.load_latest("t1").await.unwrap().unwrap();
        assert_eq!(loaded.step, 3);
        assert_eq!(loaded.frontier, session.frontier);
        assert!(store.load_latest("t2").await.unwrap().is_none());
    }
}
