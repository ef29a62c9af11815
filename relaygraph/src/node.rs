//! Node execution primitives: the [`Node`] trait, execution context,
//! partial state updates, suspension, and error types.
//!
//! A node is one unit of work in a conversation turn. It receives an
//! immutable [`StateSnapshot`] plus a [`NodeContext`] and produces a
//! [`NodeOutput`]: either a partial state update (merged by the barrier)
//! or a [`Suspend`](NodeOutput::Suspend) signal that pauses the thread
//! pending external input. Suspension is a first-class result variant,
//! not an error; `NodeError` is reserved for genuine failures that
//! abort the step.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

use crate::channels::errors::ErrorEvent;
use crate::control::FrontierCommand;
use crate::event_bus::Event;
use crate::message::Message;
use crate::state::StateSnapshot;

/// Core trait for executable workflow nodes.
///
/// Nodes should be stateless and deterministic with respect to their
/// inputs: the runner may re-enter a node from its start after a
/// suspension, and the replay must reach the same tool-call boundary.
#[async_trait]
pub trait Node: Send + Sync {
    async fn run(&self, snapshot: StateSnapshot, ctx: NodeContext)
    -> Result<NodeOutput, NodeError>;
}

/// What a node produced: a state update to merge, or a suspension.
#[derive(Clone, Debug)]
pub enum NodeOutput {
    /// Merge this partial update and continue routing.
    Update(NodePartial),
    /// Pause the thread awaiting external input. No state from this
    /// step is applied; the pre-step checkpoint remains durable.
    Suspend(Interrupt),
}

impl From<NodePartial> for NodeOutput {
    fn from(partial: NodePartial) -> Self {
        NodeOutput::Update(partial)
    }
}

/// A request for external (human) input, keyed by the originating tool
/// call so the resume payload can be paired with the exact call site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interrupt {
    pub question: String,
    pub tool_call_id: String,
}

/// Externally supplied answer injected on resume.
///
/// The runner hands this to the suspended node via [`NodeContext::resume`];
/// the tool call whose id matches treats the value as its return value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResumeValue {
    pub tool_call_id: String,
    pub value: Value,
}

/// Execution context passed to nodes.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Identifier of this node instance within the graph.
    pub node_id: String,
    /// Step number of the current superstep.
    pub step: u64,
    /// Channel for emitting diagnostic events.
    pub event_sender: flume::Sender<Event>,
    /// Present only when re-entering the node that suspended this thread.
    pub resume: Option<ResumeValue>,
}

impl NodeContext {
    /// Emit a node-scoped diagnostic event enriched with this context's
    /// identity and step.
    pub fn emit(
        &self,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), NodeContextError> {
        self.event_sender
            .send(Event::node_message(
                self.node_id.clone(),
                self.step,
                scope,
                message,
            ))
            .map_err(|_| NodeContextError::EventBusUnavailable)
    }

    /// The resume payload, if it is addressed to the given tool call.
    #[must_use]
    pub fn resume_for(&self, tool_call_id: &str) -> Option<&Value> {
        self.resume
            .as_ref()
            .filter(|r| r.tool_call_id == tool_call_id)
            .map(|r| &r.value)
    }
}

/// Partial state update returned by a node.
///
/// All fields are optional so nodes touch only what they own. Messages
/// append by default; `reset_messages` is the explicit strip transform
/// that replaces the transcript wholesale (task-framed handoffs are its
/// only intended user). A `frontier` command overrides the node's static
/// and conditional edges for this step.
#[derive(Clone, Debug, Default)]
pub struct NodePartial {
    pub messages: Option<Vec<Message>>,
    pub reset_messages: bool,
    pub extra: Option<FxHashMap<String, Value>>,
    pub errors: Option<Vec<ErrorEvent>>,
    pub frontier: Option<FrontierCommand>,
}

impl NodePartial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append messages to the transcript.
    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    /// Replace the transcript with exactly these messages.
    #[must_use]
    pub fn with_reset_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self.reset_messages = true;
        self
    }

    #[must_use]
    pub fn with_extra(mut self, extra: FxHashMap<String, Value>) -> Self {
        self.extra = Some(extra);
        self
    }

    #[must_use]
    pub fn with_errors(mut self, errors: Vec<ErrorEvent>) -> Self {
        self.errors = Some(errors);
        self
    }

    #[must_use]
    pub fn with_frontier(mut self, command: FrontierCommand) -> Self {
        self.frontier = Some(command);
        self
    }
}

/// Errors from [`NodeContext`] methods.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeContextError {
    #[error("failed to emit event: event bus unavailable")]
    #[diagnostic(
        code(relaygraph::node::event_bus_unavailable),
        help("The event bus listener may have shut down.")
    )]
    EventBusUnavailable,
}

/// Fatal node failures that abort the current step.
///
/// Recoverable conditions belong in `NodePartial::errors` (they are
/// recorded and execution continues); domain-level failures belong in
/// the conversation as tool messages.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(relaygraph::node::missing_input),
        help("Check that an upstream node produced the required field.")
    )]
    MissingInput { what: &'static str },

    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(relaygraph::node::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    #[error(transparent)]
    #[diagnostic(code(relaygraph::node::serde_json))]
    Serde(#[from] serde_json::Error),

    #[error("validation failed: {0}")]
    #[diagnostic(code(relaygraph::node::validation))]
    ValidationFailed(String),

    /// A persisted route names a node absent from the current graph.
    /// Configuration drift, surfaced loudly rather than rerouted.
    #[error("stale route: active agent {agent:?} is not part of this graph")]
    #[diagnostic(
        code(relaygraph::node::stale_route),
        help("The persisted thread references a node removed from the graph configuration.")
    )]
    StaleRoute { agent: String },

    #[error("event bus error: {0}")]
    #[diagnostic(code(relaygraph::node::event_bus))]
    EventBus(#[from] NodeContextError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn partial_builder_sets_reset_flag() {
        let partial = NodePartial::new().with_reset_messages(vec![Message::user("task")]);
        assert!(partial.reset_messages);
        assert_eq!(partial.messages.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn resume_for_matches_only_its_call() {
        let (tx, _rx) = flume::unbounded();
        let ctx = NodeContext {
            node_id: "gate".into(),
            step: 2,
            event_sender: tx,
            resume: Some(ResumeValue {
                tool_call_id: "call-gate-2-0".into(),
                value: serde_json::json!("yes"),
            }),
        };
        assert!(ctx.resume_for("call-gate-2-0").is_some());
        assert!(ctx.resume_for("call-gate-2-1").is_none());
    }
}
