/*!
Serde-friendly persisted shapes for runtime state and checkpoints,
decoupled from the in-memory representations so storage backends stay
lean and declarative. This module performs no I/O.
*/

use chrono::Utc;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    channels::{Channel, ErrorsChannel, ExtrasChannel, MessagesChannel},
    message::Message,
    runtimes::checkpointer::Checkpoint,
    runtimes::runner::PendingInterrupt,
    state::VersionedState,
    types::NodeKind,
};

/// Persisted vector channel (messages, errors) with version metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedVecChannel<T> {
    pub version: u32,
    #[serde(default)]
    pub items: Vec<T>,
}

impl<T> Default for PersistedVecChannel<T> {
    fn default() -> Self {
        Self {
            version: 1,
            items: Vec::new(),
        }
    }
}

/// Persisted map channel (extra) with version metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedMapChannel<V> {
    pub version: u32,
    #[serde(default)]
    pub map: FxHashMap<String, V>,
}

impl<V> Default for PersistedMapChannel<V> {
    fn default() -> Self {
        Self {
            version: 1,
            map: FxHashMap::default(),
        }
    }
}

/// Complete persisted shape of the in-memory `VersionedState`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PersistedState {
    pub messages: PersistedVecChannel<Message>,
    pub extra: PersistedMapChannel<Value>,
    #[serde(default)]
    pub errors: PersistedVecChannel<crate::channels::errors::ErrorEvent>,
}

/// Persisted form of an outstanding human-in-the-loop interrupt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedInterrupt {
    /// Suspended node encoded with `NodeKind::encode`.
    pub node: String,
    pub question: String,
    pub tool_call_id: String,
}

/// Full persisted checkpoint representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedCheckpoint {
    pub session_id: String,
    pub step: u64,
    pub state: PersistedState,
    /// Frontier encoded with `NodeKind::encode`.
    pub frontier: Vec<String>,
    #[serde(default)]
    pub pending_interrupt: Option<PersistedInterrupt>,
    /// RFC3339 creation time.
    pub created_at: String,
}

/* ---------- VersionedState <-> PersistedState ---------- */

impl From<&VersionedState> for PersistedState {
    fn from(s: &VersionedState) -> Self {
        PersistedState {
            messages: PersistedVecChannel {
                version: s.messages.version(),
                items: s.messages.snapshot(),
            },
            extra: PersistedMapChannel {
                version: s.extra.version(),
                map: s.extra.snapshot(),
            },
            errors: PersistedVecChannel {
                version: s.errors.version(),
                items: s.errors.snapshot(),
            },
        }
    }
}

impl From<PersistedState> for VersionedState {
    fn from(p: PersistedState) -> Self {
        VersionedState {
            messages: MessagesChannel::new(p.messages.items, p.messages.version),
            extra: ExtrasChannel::new(p.extra.map, p.extra.version),
            errors: ErrorsChannel::new(p.errors.items, p.errors.version),
        }
    }
}

/* ---------- Checkpoint <-> PersistedCheckpoint ---------- */

impl From<&Checkpoint> for PersistedCheckpoint {
    fn from(cp: &Checkpoint) -> Self {
        PersistedCheckpoint {
            session_id: cp.session_id.clone(),
            step: cp.step,
            state: PersistedState::from(&cp.state),
            frontier: cp.frontier.iter().map(NodeKind::encode).collect(),
            pending_interrupt: cp.pending_interrupt.as_ref().map(|i| PersistedInterrupt {
                node: i.node.encode(),
                question: i.question.clone(),
                tool_call_id: i.tool_call_id.clone(),
            }),
            created_at: cp.created_at.to_rfc3339(),
        }
    }
}

impl From<PersistedCheckpoint> for Checkpoint {
    fn from(p: PersistedCheckpoint) -> Self {
        let created_at = chrono::DateTime::parse_from_rfc3339(&p.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Checkpoint {
            session_id: p.session_id,
            step: p.step,
            state: VersionedState::from(p.state),
            frontier: p.frontier.iter().map(|s| NodeKind::decode(s)).collect(),
            pending_interrupt: p.pending_interrupt.map(|i| PendingInterrupt {
                node: NodeKind::decode(&i.node),
                question: i.question,
                tool_call_id: i.tool_call_id,
            }),
            created_at,
        }
    }
}
