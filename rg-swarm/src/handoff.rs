//! Handoff tools: how an agent ends its turn and transfers control.
//!
//! Both variants produce a [`HandoffDirective`], a transient value the
//! agent node translates into engine primitives (an `active_agent`
//! update plus a frontier replacement). Directives are pure functions of
//! the snapshot they were built from: invoking a handoff tool twice on
//! identical state yields identical directives, so an engine-level step
//! retry is safe.
//!
//! - **State-propagating** handoffs keep the whole transcript and
//!   forward either an explicit allow-list of domain fields or every
//!   field not in the reserved set.
//! - **Task-framed** handoffs discard the transcript and seed the target
//!   with a single synthesized task message, with the same field rule.
//!   This is the one sanctioned use of the transcript reset transform.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;

use relaygraph::message::Message;
use relaygraph::state::{ACTIVE_AGENT_KEY, StateSnapshot};

use crate::tools::{Tool, ToolError, ToolInvocation, ToolOutcome};

/// Keys never forwarded by field propagation. The transcript lives in
/// its own channel, so only ownership metadata is reserved here.
pub const RESERVED_KEYS: &[&str] = &[ACTIVE_AGENT_KEY];

/// Routing scope of a handoff.
///
/// `Parent` returns control to the enclosing graph rather than a node
/// inside the calling agent's own sub-graph; every swarm handoff is
/// parent-scoped, which is what lets a nested pipeline (the RAG
/// sub-graph) hand control to a sibling agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandoffScope {
    Parent,
    Local,
}

/// How the target agent's transcript is seeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandoffMessages {
    /// Keep the full history; append a transfer notice tool message.
    Forward { notice: Message },
    /// Replace the history with a single task instruction.
    TaskSeed(Message),
}

/// Transient product of a handoff tool invocation; consumed by the
/// agent node within the same engine step.
#[derive(Clone, Debug, PartialEq)]
pub struct HandoffDirective {
    pub target_node: String,
    pub scope: HandoffScope,
    /// Domain fields to forward, `active_agent` included.
    pub state_update: FxHashMap<String, Value>,
    pub messages: HandoffMessages,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum HandoffVariant {
    StatePropagating,
    TaskFramed,
}

/// A handoff exposed to an agent's reasoning step as an ordinary tool.
pub struct HandoffTool {
    name: String,
    description: String,
    target: String,
    variant: HandoffVariant,
    propagate_keys: Option<Vec<String>>,
}

fn normalize_agent_name(agent: &str) -> String {
    agent.to_lowercase().replace([' ', '-'], "_")
}

impl HandoffTool {
    /// State-propagating handoff to `target`, forwarding every
    /// non-reserved field (or only `propagate_keys` when given).
    #[must_use]
    pub fn state_propagating(
        target: &str,
        description: &str,
        propagate_keys: Option<Vec<String>>,
    ) -> Self {
        Self {
            name: format!("transfer_to_{}", normalize_agent_name(target)),
            description: description.to_string(),
            target: target.to_string(),
            variant: HandoffVariant::StatePropagating,
            propagate_keys,
        }
    }

    /// Task-framed handoff to `target`. The tool requires a
    /// `task_message` argument at invocation time.
    #[must_use]
    pub fn task_framed(
        target: &str,
        description: &str,
        propagate_keys: Option<Vec<String>>,
    ) -> Self {
        Self {
            name: format!("handoff_to_{}", normalize_agent_name(target)),
            description: description.to_string(),
            target: target.to_string(),
            variant: HandoffVariant::TaskFramed,
            propagate_keys,
        }
    }

    /// Node name this tool transfers to.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    fn propagated_fields(&self, snapshot: &StateSnapshot) -> FxHashMap<String, Value> {
        let mut fields = FxHashMap::default();
        match &self.propagate_keys {
            Some(keys) => {
                for key in keys {
                    if let Some(value) = snapshot.extra.get(key) {
                        fields.insert(key.clone(), value.clone());
                    }
                }
            }
            None => {
                for (key, value) in &snapshot.extra {
                    if !RESERVED_KEYS.contains(&key.as_str()) {
                        fields.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        fields.insert(
            ACTIVE_AGENT_KEY.to_string(),
            Value::String(self.target.clone()),
        );
        fields
    }

    /// Build the directive for the given snapshot. Pure: no side
    /// effects beyond the returned value.
    pub fn directive(
        &self,
        snapshot: &StateSnapshot,
        tool_call_id: &str,
        task_message: Option<&str>,
    ) -> Result<HandoffDirective, String> {
        let state_update = self.propagated_fields(snapshot);
        let messages = match self.variant {
            HandoffVariant::StatePropagating => HandoffMessages::Forward {
                notice: Message::tool(
                    &format!("Successfully transferred to {}", self.target),
                    tool_call_id,
                ),
            },
            HandoffVariant::TaskFramed => {
                let Some(task) = task_message.filter(|t| !t.trim().is_empty()) else {
                    return Err(format!(
                        "{} requires a task_message describing the sub-task",
                        self.name
                    ));
                };
                HandoffMessages::TaskSeed(Message::user(task))
            }
        };
        Ok(HandoffDirective {
            target_node: self.target.clone(),
            scope: HandoffScope::Parent,
            state_update,
            messages,
        })
    }
}

#[async_trait]
impl Tool for HandoffTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, invocation: ToolInvocation<'_>) -> Result<ToolOutcome, ToolError> {
        let task_message = invocation
            .arguments
            .get("task_message")
            .and_then(Value::as_str);
        match self.directive(invocation.snapshot, invocation.tool_call_id, task_message) {
            Ok(directive) => Ok(ToolOutcome::Handoff(directive)),
            // Missing task message is a domain error: converse about it.
            Err(reason) => Ok(ToolOutcome::reply(Message::tool(
                &reason,
                invocation.tool_call_id,
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaygraph::state::VersionedState;
    use serde_json::json;

    fn snapshot_with_fields() -> StateSnapshot {
        let mut state = VersionedState::new_with_user_message("What is 12 * 4?");
        state.add_extra("math_result", json!(48));
        state.add_extra("location", json!("Belem"));
        state.add_extra(ACTIVE_AGENT_KEY, json!("math_specialist"));
        state.snapshot()
    }

    #[test]
    fn propagating_forwards_all_but_reserved() {
        let tool = HandoffTool::state_propagating("coordinator", "back to coordinator", None);
        let directive = tool
            .directive(&snapshot_with_fields(), "call-math-2-1", None)
            .unwrap();

        assert_eq!(directive.target_node, "coordinator");
        assert_eq!(directive.scope, HandoffScope::Parent);
        assert_eq!(directive.state_update.get("math_result"), Some(&json!(48)));
        assert_eq!(directive.state_update.get("location"), Some(&json!("Belem")));
        // active_agent is rewritten to the target, never forwarded as-is.
        assert_eq!(
            directive.state_update.get(ACTIVE_AGENT_KEY),
            Some(&json!("coordinator"))
        );
        assert!(matches!(
            directive.messages,
            HandoffMessages::Forward { .. }
        ));
    }

    #[test]
    fn allow_list_restricts_propagation() {
        let tool = HandoffTool::state_propagating(
            "coordinator",
            "back",
            Some(vec!["math_result".to_string()]),
        );
        let directive = tool
            .directive(&snapshot_with_fields(), "call-math-2-1", None)
            .unwrap();
        assert_eq!(directive.state_update.get("math_result"), Some(&json!(48)));
        assert!(!directive.state_update.contains_key("location"));
    }

    #[test]
    fn task_framed_discards_history() {
        let tool = HandoffTool::task_framed("math_specialist", "delegate math", None);
        let directive = tool
            .directive(&snapshot_with_fields(), "call-coordinator-1-0", Some("Calculate 12 * 4"))
            .unwrap();
        match &directive.messages {
            HandoffMessages::TaskSeed(seed) => {
                assert_eq!(seed.content, "Calculate 12 * 4");
                assert_eq!(seed.role, Message::USER);
            }
            other => panic!("expected task seed, got {other:?}"),
        }
    }

    #[test]
    fn directives_are_idempotent() {
        let snapshot = snapshot_with_fields();
        let tool = HandoffTool::state_propagating("coordinator", "back", None);
        let first = tool.directive(&snapshot, "call-math-2-1", None).unwrap();
        let second = tool.directive(&snapshot, "call-math-2-1", None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn task_framed_without_task_is_a_domain_error() {
        let tool = HandoffTool::task_framed("math_specialist", "delegate math", None);
        assert!(
            tool.directive(&snapshot_with_fields(), "call-1", None)
                .is_err()
        );
    }
}
