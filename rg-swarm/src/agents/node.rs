//! The agent node: a bounded decide→act→observe loop.
//!
//! Each turn, the agent renders its instruction block from identity and
//! tool descriptors, asks the inference seam for the next action, and
//! executes tool calls sequentially. Tool-call ids are derived from
//! `(node, step, round)`, replay-stable by construction, so a node
//! re-entered after a suspension pairs the resume payload with the exact
//! call that suspended.
//!
//! A handoff outcome ends the turn: the directive's field updates (the
//! new `active_agent` included) are merged and the frontier is replaced
//! with the target node. Everything else accumulates into one partial
//! returned when the agent responds or runs out of rounds.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use relaygraph::control::FrontierCommand;
use relaygraph::message::Message;
use relaygraph::node::{Interrupt, Node, NodeContext, NodeError, NodeOutput, NodePartial};
use relaygraph::state::StateSnapshot;
use relaygraph::types::NodeKind;
use relaygraph::utils::collections::new_extra_map;
use relaygraph::utils::id_generator::IdGenerator;

use crate::fields;
use crate::handoff::{HandoffDirective, HandoffMessages};
use crate::infer::{StructuredInfer, schema};
use crate::tools::{Tool, ToolInvocation, ToolOutcome};

/// Fallback reply when the inference seam is unavailable or returns a
/// shape that does not parse as a decision.
const FALLBACK_REPLY: &str = "I could not process that request right now; please try again.";

/// Next action chosen by the agent's reasoning step.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum AgentDecision {
    Respond {
        message: String,
    },
    UseTool {
        tool: String,
        #[serde(default)]
        arguments: Value,
    },
}

pub struct AgentNode {
    name: String,
    identity: String,
    responsibilities: Vec<String>,
    constraints: Vec<String>,
    tools: Vec<Arc<dyn Tool>>,
    infer: Arc<dyn StructuredInfer>,
    max_rounds: usize,
}

impl AgentNode {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn from_parts(
        name: String,
        identity: String,
        responsibilities: Vec<String>,
        constraints: Vec<String>,
        tools: Vec<Arc<dyn Tool>>,
        infer: Arc<dyn StructuredInfer>,
        max_rounds: usize,
    ) -> Self {
        Self {
            name,
            identity,
            responsibilities,
            constraints,
            tools,
            infer,
            max_rounds,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deterministic instruction block rendered from the agent's
    /// declaration and its tool descriptors.
    fn render_instruction(&self) -> String {
        let mut out = format!("You are {}.\n", self.identity);
        if !self.responsibilities.is_empty() {
            out.push_str("Responsibilities:\n");
            for r in &self.responsibilities {
                out.push_str(&format!("- {r}\n"));
            }
        }
        if !self.constraints.is_empty() {
            out.push_str("Constraints:\n");
            for c in &self.constraints {
                out.push_str(&format!("- {c}\n"));
            }
        }
        out.push_str("Available tools:\n");
        for tool in &self.tools {
            out.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
        }
        out.push_str(
            "Decide the next action. Reply with \
             {\"action\":\"respond\",\"message\":\"...\"} or \
             {\"action\":\"use_tool\",\"tool\":\"...\",\"arguments\":{...}}.",
        );
        out
    }

    fn find_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Translate a handoff directive into the returned partial: merge
    /// its field updates and replace the frontier with the target.
    fn handoff_partial(
        directive: HandoffDirective,
        turn_messages: Vec<Message>,
        mut fields: rustc_hash::FxHashMap<String, Value>,
    ) -> NodePartial {
        for (key, value) in directive.state_update {
            fields.insert(key, value);
        }
        let frontier = FrontierCommand::goto(NodeKind::Custom(directive.target_node));
        match directive.messages {
            HandoffMessages::Forward { notice } => {
                let mut messages = turn_messages;
                messages.push(notice);
                NodePartial::new()
                    .with_messages(messages)
                    .with_extra(fields)
                    .with_frontier(frontier)
            }
            // The target starts from a clean transcript: even this
            // turn's intermediate messages are dropped.
            HandoffMessages::TaskSeed(seed) => NodePartial::new()
                .with_reset_messages(vec![seed])
                .with_extra(fields)
                .with_frontier(frontier),
        }
    }
}

#[async_trait]
impl Node for AgentNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let instruction = self.render_instruction();
        let mut turn_messages: Vec<Message> = Vec::new();
        let mut turn_fields = new_extra_map();

        for round in 0..self.max_rounds {
            let mut transcript: Vec<Message> = snapshot.messages.clone();
            transcript.extend(turn_messages.iter().cloned());
            let mut field_view = snapshot.extra.clone();
            for (k, v) in &turn_fields {
                field_view.insert(k.clone(), v.clone());
            }
            let context = json!({
                "agent": self.name,
                "transcript": transcript,
                "fields": field_view,
            });

            let decision = match self
                .infer
                .infer(&instruction, Some(schema::AGENT_DECISION), &context)
                .await
                .map(serde_json::from_value::<AgentDecision>)
            {
                Ok(Ok(decision)) => decision,
                Ok(Err(parse_err)) => {
                    ctx.emit("decision", format!("undecodable decision: {parse_err}"))?;
                    AgentDecision::Respond {
                        message: FALLBACK_REPLY.to_string(),
                    }
                }
                Err(infer_err) => {
                    ctx.emit("decision", format!("inference unavailable: {infer_err}"))?;
                    AgentDecision::Respond {
                        message: FALLBACK_REPLY.to_string(),
                    }
                }
            };

            match decision {
                AgentDecision::Respond { message } => {
                    turn_messages.push(Message::assistant(&message));
                    return Ok(NodePartial::new()
                        .with_messages(turn_messages)
                        .with_extra(turn_fields)
                        .into());
                }
                AgentDecision::UseTool { tool, arguments } => {
                    let tool_call_id = IdGenerator::tool_call_id(&ctx.node_id, ctx.step, round);
                    let Some(tool_impl) = self.find_tool(&tool) else {
                        turn_messages.push(Message::tool(
                            &format!("No tool named {tool} is available to this agent"),
                            &tool_call_id,
                        ));
                        continue;
                    };
                    ctx.emit("tool", format!("{tool} ({tool_call_id})"))?;

                    let outcome = tool_impl
                        .invoke(ToolInvocation {
                            arguments,
                            tool_call_id: &tool_call_id,
                            snapshot: &snapshot,
                        })
                        .await
                        .map_err(|e| NodeError::Provider {
                            provider: "tool",
                            message: e.to_string(),
                        })?;

                    match outcome {
                        ToolOutcome::Update { messages, fields } => {
                            turn_messages.extend(messages);
                            for (k, v) in fields {
                                turn_fields.insert(k, v);
                            }
                        }
                        ToolOutcome::Handoff(directive) => {
                            ctx.emit("handoff", directive.target_node.clone())?;
                            return Ok(Self::handoff_partial(
                                directive,
                                turn_messages,
                                turn_fields,
                            )
                            .into());
                        }
                        ToolOutcome::Suspend { question } => {
                            match ctx.resume_for(&tool_call_id) {
                                Some(answer) => {
                                    let rendered = match answer {
                                        Value::String(s) => s.clone(),
                                        other => other.to_string(),
                                    };
                                    turn_messages.push(Message::tool(
                                        &format!("The user answered: {rendered}"),
                                        &tool_call_id,
                                    ));
                                    turn_fields.insert(
                                        fields::HUMAN_RESPONSE.to_string(),
                                        answer.clone(),
                                    );
                                }
                                None => {
                                    return Ok(NodeOutput::Suspend(Interrupt {
                                        question,
                                        tool_call_id,
                                    }));
                                }
                            }
                        }
                    }
                }
            }
        }

        // Round budget exhausted without a final response.
        turn_messages.push(Message::assistant(FALLBACK_REPLY));
        Ok(NodePartial::new()
            .with_messages(turn_messages)
            .with_extra(turn_fields)
            .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentBuilder;
    use crate::infer::ScriptedInfer;
    use crate::tools::math::CalculateTool;
    use relaygraph::state::VersionedState;

    fn ctx(node: &str) -> (NodeContext, flume::Receiver<relaygraph::event_bus::Event>) {
        let (tx, rx) = flume::unbounded();
        (
            NodeContext {
                node_id: node.to_string(),
                step: 1,
                event_sender: tx,
                resume: None,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn tool_then_respond() {
        let infer = Arc::new(ScriptedInfer::new(vec![
            json!({"action": "use_tool", "tool": "calculate",
                   "arguments": {"expression": "12 * 4"}}),
            json!({"action": "respond", "message": "The result is 48."}),
        ]));
        let agent = AgentBuilder::new("math_specialist", infer)
            .tool(CalculateTool)
            .build();

        let state = VersionedState::new_with_user_message("Calculate 12 * 4");
        let (ctx, _events) = ctx("math_specialist");
        let output = agent.run(state.snapshot(), ctx).await.unwrap();

        let NodeOutput::Update(partial) = output else {
            panic!("expected update");
        };
        let messages = partial.messages.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("48"));
        assert_eq!(messages[1].content, "The result is 48.");
        assert_eq!(
            partial.extra.unwrap().get(fields::MATH_RESULT),
            Some(&json!(48))
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_conversational() {
        let infer = Arc::new(ScriptedInfer::new(vec![
            json!({"action": "use_tool", "tool": "launch_rocket", "arguments": {}}),
            json!({"action": "respond", "message": "I cannot do that."}),
        ]));
        let agent = AgentBuilder::new("coordinator", infer).build();
        let state = VersionedState::new_with_user_message("launch!");
        let (ctx, _events) = ctx("coordinator");
        let output = agent.run(state.snapshot(), ctx).await.unwrap();
        let NodeOutput::Update(partial) = output else {
            panic!("expected update");
        };
        let messages = partial.messages.unwrap();
        assert!(messages[0].content.contains("No tool named launch_rocket"));
    }

    #[tokio::test]
    async fn inference_outage_falls_back_to_reply() {
        let agent =
            AgentBuilder::new("coordinator", Arc::new(crate::infer::UnavailableInfer)).build();
        let state = VersionedState::new_with_user_message("hello");
        let (ctx, _events) = ctx("coordinator");
        let output = agent.run(state.snapshot(), ctx).await.unwrap();
        let NodeOutput::Update(partial) = output else {
            panic!("expected update");
        };
        assert_eq!(partial.messages.unwrap()[0].content, FALLBACK_REPLY);
    }
}
