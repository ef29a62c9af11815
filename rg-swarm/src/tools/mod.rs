//! Uniform tool interface for agent reasoning steps.
//!
//! Every callable an agent can reach satisfies [`Tool`] explicitly at
//! registration time (name, description, invoke) so agent prompts can
//! be rendered from the descriptors without any runtime introspection.
//!
//! Domain-level failures (a malformed expression, an invalid record
//! number) are NOT errors: they come back as tool messages and the agent
//! converses about them. [`ToolError`] is reserved for failures that
//! should abort the step.

pub mod human;
pub mod math;
pub mod records;
pub mod weather;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

use relaygraph::message::Message;
use relaygraph::state::StateSnapshot;

use crate::handoff::HandoffDirective;

/// One tool call as seen by the tool implementation.
pub struct ToolInvocation<'a> {
    /// Arguments object produced by the agent's reasoning step.
    pub arguments: Value,
    /// Replay-stable id of this call.
    pub tool_call_id: &'a str,
    /// Read-only view of the conversation state.
    pub snapshot: &'a StateSnapshot,
}

/// What a tool call produced.
pub enum ToolOutcome {
    /// Messages to append and domain fields to merge.
    Update {
        messages: Vec<Message>,
        fields: FxHashMap<String, Value>,
    },
    /// End the agent's turn and transfer control.
    Handoff(HandoffDirective),
    /// Suspend the thread awaiting an external answer to `question`.
    Suspend { question: String },
}

impl ToolOutcome {
    /// A message-only outcome with no field updates.
    #[must_use]
    pub fn reply(message: Message) -> Self {
        ToolOutcome::Update {
            messages: vec![message],
            fields: FxHashMap::default(),
        }
    }

    /// A message plus field updates.
    #[must_use]
    pub fn update(message: Message, fields: FxHashMap<String, Value>) -> Self {
        ToolOutcome::Update {
            messages: vec![message],
            fields,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    #[error("tool {tool} failed: {message}")]
    #[diagnostic(code(rg_swarm::tools::failed))]
    Failed { tool: String, message: String },
}

/// A callable exposed to an agent's reasoning step.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn invoke(&self, invocation: ToolInvocation<'_>) -> Result<ToolOutcome, ToolError>;
}

/// Read a required string argument, or explain what is missing in a
/// conversational tool message.
pub(crate) fn require_str_arg<'a>(
    arguments: &'a Value,
    key: &str,
    tool_name: &str,
    tool_call_id: &str,
) -> Result<&'a str, Box<ToolOutcome>> {
    match arguments.get(key).and_then(Value::as_str) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Box::new(ToolOutcome::reply(Message::tool(
            &format!("{tool_name} requires a {key} argument"),
            tool_call_id,
        )))),
    }
}
