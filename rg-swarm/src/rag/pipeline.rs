//! The RAG pipeline mounted as a swarm agent.
//!
//! Each activation seeds a fresh [`RagState`] from the parent
//! conversation, runs the pipeline graph to completion, and either
//! merges the produced answer back into the caller's domain fields or,
//! when query analysis routed out of domain, re-emits the transfer at
//! parent scope so a sibling agent takes over.

use serde_json::json;
use std::sync::Arc;

use async_trait::async_trait;

use relaygraph::app::App;
use relaygraph::control::FrontierCommand;
use relaygraph::graphs::GraphCompileError;
use relaygraph::message::Message;
use relaygraph::node::{Node, NodeContext, NodeError, NodeOutput, NodePartial};
use relaygraph::state::{ACTIVE_AGENT_KEY, StateSnapshot, VersionedState};
use relaygraph::types::NodeKind;
use relaygraph::utils::collections::new_extra_map;
use relaygraph::utils::id_generator::IdGenerator;

use crate::fields;
use crate::infer::StructuredInfer;

use super::build_rag_app;
use super::state::{DEFAULT_MAX_RETRIES, RagState, string_list};

pub struct RagPipelineNode {
    app: App,
    max_retries: u32,
}

impl RagPipelineNode {
    /// Compile the inner pipeline graph with the default retry budget.
    pub fn new(infer: Arc<dyn StructuredInfer>) -> Result<Self, GraphCompileError> {
        Self::with_max_retries(infer, DEFAULT_MAX_RETRIES)
    }

    pub fn with_max_retries(
        infer: Arc<dyn StructuredInfer>,
        max_retries: u32,
    ) -> Result<Self, GraphCompileError> {
        Ok(Self {
            app: build_rag_app(infer)?,
            max_retries,
        })
    }

    fn seed_state(&self, snapshot: &StateSnapshot, query: &str) -> VersionedState {
        let rag = RagState::for_query(
            query,
            string_list(snapshot.extra.get(fields::SOURCE_REFS)),
            string_list(snapshot.extra.get(fields::SEEN_DOCUMENTS)),
            self.max_retries,
        );
        let mut state = VersionedState::new_with_user_message(query);
        state.add_extra(
            fields::RAG_STATE,
            serde_json::to_value(&rag).expect("RagState serializes"),
        );
        state
    }
}

#[async_trait]
impl Node for RagPipelineNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let query = snapshot
            .last_user_message()
            .ok_or(NodeError::MissingInput {
                what: "user message for the RAG pipeline",
            })?
            .to_string();

        let initial = self.seed_state(&snapshot, &query);
        let final_state = self.app.invoke(initial).await.map_err(|e| {
            NodeError::Provider {
                provider: "rag_pipeline",
                message: e.to_string(),
            }
        })?;
        let final_snapshot = final_state.snapshot();
        let rag = RagState::load(&final_snapshot)?;

        // Out-of-domain: hand control to the sibling agent at parent
        // scope, state-propagating (the parent transcript is kept).
        if let Some(target) = rag.handoff_to_agent.as_deref() {
            ctx.emit("handoff", target.to_string())?;
            let tool_call_id = IdGenerator::tool_call_id(&ctx.node_id, ctx.step, 0);
            let mut extra = new_extra_map();
            extra.insert(ACTIVE_AGENT_KEY.to_string(), json!(target));
            let partial = NodePartial::new()
                .with_messages(vec![Message::tool(
                    &format!("Successfully transferred to {target}"),
                    &tool_call_id,
                )])
                .with_extra(extra)
                .with_frontier(FrontierCommand::goto(NodeKind::Custom(target.to_string())));
            return Ok(partial.into());
        }

        let answer = final_snapshot
            .messages
            .iter()
            .rev()
            .find(|m| m.has_role(Message::ASSISTANT))
            .map(|m| m.content.clone())
            .unwrap_or_else(|| rag.generated_response.clone());

        let mut extra = new_extra_map();
        extra.insert(fields::RAG_RESPONSE.to_string(), json!(answer));
        extra.insert(
            fields::CITATIONS.to_string(),
            serde_json::to_value(&rag.citations).map_err(NodeError::Serde)?,
        );
        extra.insert(fields::QUALITY_SCORE.to_string(), json!(rag.quality_score));
        extra.insert(
            fields::SEEN_DOCUMENTS.to_string(),
            json!(rag.seen_documents),
        );

        let partial = NodePartial::new()
            .with_messages(vec![Message::assistant(&answer)])
            .with_extra(extra);
        Ok(partial.into())
    }
}
