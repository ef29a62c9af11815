//! Agent construction and execution.
//!
//! An agent is a graph node wrapping a bounded decide→act→observe loop:
//! the inference seam picks the next action (respond, or call one of the
//! agent's tools), tools run sequentially, and handoffs or suspensions
//! end the turn early. [`AgentBuilder`] assembles identity,
//! responsibilities, constraints, and the tool set into an [`AgentNode`].

mod builder;
mod node;

pub use builder::AgentBuilder;
pub use node::AgentNode;
