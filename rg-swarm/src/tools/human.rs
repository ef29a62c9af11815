//! Human-in-the-loop gate.
//!
//! `ask_user` surfaces a question and suspends the thread. The tool is
//! pure: it only *requests* suspension; the agent node pairs the call
//! with any resume payload and either injects the answer or propagates
//! the suspension to the runner.

use async_trait::async_trait;
use serde_json::Value;

use relaygraph::message::Message;

use super::{Tool, ToolError, ToolInvocation, ToolOutcome};

pub struct AskUserTool;

#[async_trait]
impl Tool for AskUserTool {
    fn name(&self) -> &str {
        "ask_user"
    }

    fn description(&self) -> &str {
        "Ask the user a question when their input is required to proceed. \
         The conversation pauses until they answer."
    }

    async fn invoke(&self, invocation: ToolInvocation<'_>) -> Result<ToolOutcome, ToolError> {
        match invocation
            .arguments
            .get("question")
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
        {
            Some(question) => Ok(ToolOutcome::Suspend {
                question: question.to_string(),
            }),
            None => Ok(ToolOutcome::reply(Message::tool(
                "ask_user requires a question argument",
                invocation.tool_call_id,
            ))),
        }
    }
}
