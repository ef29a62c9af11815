//! Core identifiers for workflow graphs: node kinds and state channels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a node within a workflow graph.
///
/// `Start` and `End` are virtual endpoints: they are never registered or
/// executed, they only anchor the graph's entry and exit topology. All
/// executable nodes are `Custom` with a user-chosen name.
///
/// # Examples
///
/// ```
/// use relaygraph::types::NodeKind;
///
/// let agent = NodeKind::Custom("coordinator".into());
/// assert_eq!(agent.encode(), "Custom:coordinator");
/// assert_eq!(NodeKind::decode(&agent.encode()), agent);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Virtual entry point; the initial frontier is whatever `Start` points at.
    Start,
    /// Virtual exit; a frontier of only `End` entries terminates the run.
    End,
    /// An executable node identified by name.
    Custom(String),
}

impl NodeKind {
    /// Encode into the persisted string form.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            NodeKind::Start => "Start".to_string(),
            NodeKind::End => "End".to_string(),
            NodeKind::Custom(s) => format!("Custom:{s}"),
        }
    }

    /// Decode the persisted string form. Unknown encodings round-trip as
    /// `Custom` so newer persisted threads stay loadable.
    pub fn decode(s: &str) -> Self {
        if s == "Start" {
            NodeKind::Start
        } else if s == "End" {
            NodeKind::End
        } else if let Some(rest) = s.strip_prefix("Custom:") {
            NodeKind::Custom(rest.to_string())
        } else {
            NodeKind::Custom(s.to_string())
        }
    }

    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }

    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::End => write!(f, "End"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        match s {
            "Start" => NodeKind::Start,
            "End" => NodeKind::End,
            other => NodeKind::Custom(other.to_string()),
        }
    }
}

/// Identifies one of the versioned state channels.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    /// Conversation transcript.
    Message,
    /// Error events and diagnostics.
    Error,
    /// Agent-owned domain fields and intermediate results.
    Extra,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => write!(f, "message"),
            Self::Error => write!(f, "error"),
            Self::Extra => write!(f, "extra"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        for kind in [
            NodeKind::Start,
            NodeKind::End,
            NodeKind::Custom("rag_pipeline".into()),
        ] {
            assert_eq!(NodeKind::decode(&kind.encode()), kind);
        }
    }

    #[test]
    fn unknown_encoding_becomes_custom() {
        assert_eq!(
            NodeKind::decode("router"),
            NodeKind::Custom("router".into())
        );
    }
}
