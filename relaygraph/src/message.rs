use serde::{Deserialize, Serialize};

/// A single conversation turn: a role, text content, and, for tool
/// results, the id of the tool call that produced it.
///
/// Messages are the unit of the conversation transcript shared by all
/// agent nodes. The transcript is append-only; only the dedicated
/// reset path in the message reducer may replace it wholesale.
///
/// # Examples
///
/// ```
/// use relaygraph::message::Message;
///
/// let user = Message::user("What is 12 * 4?");
/// let tool = Message::tool("The result of 12 * 4 is 48", "call-math-1-0");
///
/// assert_eq!(user.role, "user");
/// assert_eq!(tool.tool_call_id.as_deref(), Some("call-math-1-0"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Role of the sender: "user", "assistant", "system", or "tool".
    pub role: String,
    /// Text content of the turn.
    pub content: String,
    /// Id of the originating tool call, present on tool-result turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// Assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System instruction message role.
    pub const SYSTEM: &'static str = "system";
    /// Tool result message role.
    pub const TOOL: &'static str = "tool";

    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            tool_call_id: None,
        }
    }

    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Creates a tool-result message bound to the originating call id.
    #[must_use]
    pub fn tool(content: &str, tool_call_id: &str) -> Self {
        Self {
            role: Self::TOOL.to_string(),
            content: content.to_string(),
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}
