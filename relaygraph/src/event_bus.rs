//! Lightweight diagnostics bus.
//!
//! Nodes emit scoped events through [`NodeContext::emit`](crate::node::NodeContext::emit);
//! the runner owns an [`EventBus`] whose listener drains them into
//! `tracing`. Tests can subscribe to the raw channel instead.

use chrono::{DateTime, Utc};

/// A diagnostic event emitted during workflow execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub when: DateTime<Utc>,
    /// Emitting node and step, when node-scoped.
    pub node: Option<(String, u64)>,
    /// Free-form scope label ("handoff", "retrieval", ...).
    pub scope: String,
    pub message: String,
}

impl Event {
    /// Node-scoped event carrying the emitting node's identity and step.
    pub fn node_message(
        node_id: String,
        step: u64,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            when: Utc::now(),
            node: Some((node_id, step)),
            scope: scope.into(),
            message: message.into(),
        }
    }

    /// Bus-level diagnostic with no node attribution.
    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            node: None,
            scope: scope.into(),
            message: message.into(),
        }
    }
}

/// Owns the event channel for one runner instance.
pub struct EventBus {
    sender: flume::Sender<Event>,
    receiver: flume::Receiver<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self { sender, receiver }
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sender handed to node contexts.
    #[must_use]
    pub fn sender(&self) -> flume::Sender<Event> {
        self.sender.clone()
    }

    /// Receiver for custom consumers (tests, streaming frontends).
    /// Events are multi-consumer; each event is delivered to one receiver.
    #[must_use]
    pub fn receiver(&self) -> flume::Receiver<Event> {
        self.receiver.clone()
    }

    /// Spawn a background task draining events into `tracing`.
    pub fn listen(&self) -> tokio::task::JoinHandle<()> {
        let receiver = self.receiver.clone();
        tokio::spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                match &event.node {
                    Some((node, step)) => tracing::info!(
                        node = %node,
                        step = *step,
                        scope = %event.scope,
                        "{}",
                        event.message
                    ),
                    None => tracing::info!(scope = %event.scope, "{}", event.message),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_flow_through_the_channel() {
        let bus = EventBus::new();
        let rx = bus.receiver();
        bus.sender()
            .send(Event::node_message("router".into(), 1, "route", "to math"))
            .unwrap();
        let event = rx.recv().unwrap();
        assert_eq!(event.node, Some(("router".into(), 1)));
        assert_eq!(event.scope, "route");
    }
}
