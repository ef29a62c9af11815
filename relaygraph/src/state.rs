//! Versioned conversation state threaded through a run.
//!
//! [`VersionedState`] is the single mutable record shared by all nodes of
//! a thread. It is organized into three channels:
//!
//! - **messages**: the append-only conversation transcript
//! - **extra**: agent-owned domain fields (`active_agent`, tool results,
//!   pipeline state), a shallow JSON map
//! - **errors**: recorded non-fatal error events
//!
//! Nodes never mutate state directly; they receive an immutable
//! [`StateSnapshot`] and return partial updates which the barrier merges.

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::{
    channels::{Channel, ErrorsChannel, ExtrasChannel, MessagesChannel},
    message::Message,
};

/// Key in the extra channel naming the node that owns the conversation.
///
/// Written only by handoff directives and the router default; read by the
/// active-agent router at the start of every turn.
pub const ACTIVE_AGENT_KEY: &str = "active_agent";

/// The main state container for a conversation thread.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionedState {
    pub messages: MessagesChannel,
    pub extra: ExtrasChannel,
    pub errors: ErrorsChannel,
}

/// Immutable snapshot handed to nodes and edge predicates.
#[derive(Clone, Debug)]
pub struct StateSnapshot {
    pub messages: Vec<Message>,
    pub messages_version: u32,
    pub extra: FxHashMap<String, Value>,
    pub extra_version: u32,
    pub errors: Vec<crate::channels::errors::ErrorEvent>,
    pub errors_version: u32,
}

impl StateSnapshot {
    /// The node currently owning the conversation, if any handoff or
    /// router default has set it.
    #[must_use]
    pub fn active_agent(&self) -> Option<&str> {
        self.extra.get(ACTIVE_AGENT_KEY).and_then(Value::as_str)
    }

    /// Content of the most recent user message, if present.
    #[must_use]
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.has_role(Message::USER))
            .map(|m| m.content.as_str())
    }
}

impl VersionedState {
    /// Create a state seeded with one user message.
    ///
    /// ```
    /// use relaygraph::state::VersionedState;
    ///
    /// let state = VersionedState::new_with_user_message("hello");
    /// let snapshot = state.snapshot();
    /// assert_eq!(snapshot.messages.len(), 1);
    /// assert_eq!(snapshot.messages[0].role, "user");
    /// ```
    pub fn new_with_user_message(user_text: &str) -> Self {
        Self::new_with_messages(vec![Message::user(user_text)])
    }

    /// Create a state seeded with an existing transcript.
    pub fn new_with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: MessagesChannel::new(messages, 1),
            extra: ExtrasChannel::default(),
            errors: ErrorsChannel::default(),
        }
    }

    /// Fluent builder for states with custom transcripts and fields.
    pub fn builder() -> VersionedStateBuilder {
        VersionedStateBuilder::default()
    }

    /// Append a message. Versions are left alone; the barrier owns them.
    pub fn add_message(&mut self, message: Message) -> &mut Self {
        self.messages.get_mut().push(message);
        self
    }

    /// Insert a domain field. Versions are left alone; the barrier owns them.
    pub fn add_extra(&mut self, key: &str, value: Value) -> &mut Self {
        self.extra.get_mut().insert(key.to_string(), value);
        self
    }

    /// Clone the current channel contents and versions into a snapshot.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            messages: self.messages.snapshot(),
            messages_version: self.messages.version(),
            extra: self.extra.snapshot(),
            extra_version: self.extra.version(),
            errors: self.errors.snapshot(),
            errors_version: self.errors.version(),
        }
    }
}

/// Builder for [`VersionedState`].
///
/// ```
/// use relaygraph::state::VersionedState;
/// use serde_json::json;
///
/// let state = VersionedState::builder()
///     .with_user_message("What is the weather in Belem?")
///     .with_extra("location", json!("Belem"))
///     .build();
///
/// let snapshot = state.snapshot();
/// assert_eq!(snapshot.messages.len(), 1);
/// assert_eq!(snapshot.extra.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct VersionedStateBuilder {
    messages: Vec<Message>,
    extra: FxHashMap<String, Value>,
}

impl VersionedStateBuilder {
    pub fn with_user_message(mut self, content: &str) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    pub fn with_assistant_message(mut self, content: &str) -> Self {
        self.messages.push(Message::assistant(content));
        self
    }

    pub fn with_system_message(mut self, content: &str) -> Self {
        self.messages.push(Message::system(content));
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> VersionedState {
        VersionedState {
            messages: MessagesChannel::new(self.messages, 1),
            extra: ExtrasChannel::new(self.extra, 1),
            errors: ErrorsChannel::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn active_agent_reads_extra_key() {
        let state = VersionedState::builder()
            .with_user_message("hi")
            .with_extra(ACTIVE_AGENT_KEY, json!("coordinator"))
            .build();
        assert_eq!(state.snapshot().active_agent(), Some("coordinator"));
    }

    #[test]
    fn last_user_message_skips_later_turns() {
        let state = VersionedState::builder()
            .with_user_message("first")
            .with_assistant_message("reply")
            .build();
        assert_eq!(state.snapshot().last_user_message(), Some("first"));
    }

    #[test]
    fn snapshot_is_decoupled_from_state() {
        let mut state = VersionedState::new_with_user_message("hi");
        state.add_extra("k", json!("v"));
        let snap = state.snapshot();
        state.extra.get_mut().clear();
        assert_eq!(snap.extra.get("k"), Some(&json!("v")));
    }
}
