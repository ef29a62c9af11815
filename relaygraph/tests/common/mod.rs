#![allow(dead_code)]

use async_trait::async_trait;

use relaygraph::message::Message;
use relaygraph::node::{
    Interrupt, Node, NodeContext, NodeError, NodeOutput, NodePartial,
};
use relaygraph::state::{StateSnapshot, VersionedState};
use relaygraph::utils::id_generator::IdGenerator;

pub fn state_with_user(text: &str) -> VersionedState {
    VersionedState::new_with_user_message(text)
}

/// Appends one assistant message naming itself.
pub struct TestNode {
    pub name: &'static str,
}

#[async_trait]
impl Node for TestNode {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let partial = NodePartial::new()
            .with_messages(vec![Message::assistant(&format!("{} ran", self.name))]);
        Ok(partial.into())
    }
}

/// Replaces its frontier with a fixed target.
pub struct GotoNode {
    pub target: &'static str,
}

#[async_trait]
impl Node for GotoNode {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let partial =
            NodePartial::new().with_frontier(relaygraph::FrontierCommand::goto(self.target));
        Ok(partial.into())
    }
}

/// Suspends with a question on first entry; on resume records the
/// answer into the extra channel and completes.
pub struct AskingNode {
    pub question: &'static str,
}

#[async_trait]
impl Node for AskingNode {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let call_id = IdGenerator::tool_call_id(&ctx.node_id, ctx.step, 0);
        match ctx.resume_for(&call_id) {
            Some(answer) => {
                let mut extra = relaygraph::utils::collections::new_extra_map();
                extra.insert("human_answer".into(), answer.clone());
                let partial = NodePartial::new()
                    .with_messages(vec![Message::tool(
                        &format!("The user answered: {answer}"),
                        &call_id,
                    )])
                    .with_extra(extra);
                Ok(partial.into())
            }
            None => Ok(NodeOutput::Suspend(Interrupt {
                question: self.question.to_string(),
                tool_call_id: call_id,
            })),
        }
    }
}

/// Always fails with a validation error.
pub struct FailingNode;

#[async_trait]
impl Node for FailingNode {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        Err(NodeError::ValidationFailed("always fails".into()))
    }
}
