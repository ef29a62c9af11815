//! Control-flow directives emitted by nodes to steer subsequent scheduling.
//!
//! Frontier commands are kept separate from state updates so a node can
//! express routing intent (a handoff target, a router decision) without
//! mutating application state directly. The barrier collects them in
//! execution order and the runner reconciles them with static and
//! conditional edges.

use crate::types::NodeKind;

/// Command emitted by a node to manipulate the next frontier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrontierCommand {
    /// Replace the node's default routes entirely. This is how handoffs
    /// and the active-agent router redirect execution: static and
    /// conditional edges for the emitting node are ignored.
    Replace(Vec<NodeKind>),
    /// Append additional routes on top of the default edge resolution.
    Append(Vec<NodeKind>),
}

impl FrontierCommand {
    /// Route to a single node, replacing the default edges.
    #[must_use]
    pub fn goto(target: impl Into<NodeKind>) -> Self {
        FrontierCommand::Replace(vec![target.into()])
    }

    /// Targets named by this command, in emission order.
    #[must_use]
    pub fn targets(&self) -> &[NodeKind] {
        match self {
            FrontierCommand::Replace(t) | FrontierCommand::Append(t) => t,
        }
    }
}
