use std::sync::Arc;

use crate::infer::StructuredInfer;
use crate::tools::Tool;

use super::node::AgentNode;

const DEFAULT_MAX_ROUNDS: usize = 6;

/// Fluent assembly of an agent node.
///
/// ```no_run
/// use std::sync::Arc;
/// use rg_swarm::agents::AgentBuilder;
/// use rg_swarm::infer::UnavailableInfer;
/// use rg_swarm::tools::math::CalculateTool;
///
/// let agent = AgentBuilder::new("math_specialist", Arc::new(UnavailableInfer))
///     .identity("the math specialist, expert in numeric calculation")
///     .responsibility("Solve arithmetic expressions accurately")
///     .constraint("Always use the calculate tool to evaluate expressions")
///     .tool(CalculateTool)
///     .build();
/// ```
pub struct AgentBuilder {
    name: String,
    identity: String,
    responsibilities: Vec<String>,
    constraints: Vec<String>,
    tools: Vec<Arc<dyn Tool>>,
    infer: Arc<dyn StructuredInfer>,
    max_rounds: usize,
}

impl AgentBuilder {
    #[must_use]
    pub fn new(name: &str, infer: Arc<dyn StructuredInfer>) -> Self {
        Self {
            name: name.to_string(),
            identity: name.to_string(),
            responsibilities: Vec::new(),
            constraints: Vec::new(),
            tools: Vec::new(),
            infer,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    #[must_use]
    pub fn identity(mut self, identity: &str) -> Self {
        self.identity = identity.to_string();
        self
    }

    #[must_use]
    pub fn responsibility(mut self, responsibility: &str) -> Self {
        self.responsibilities.push(responsibility.to_string());
        self
    }

    #[must_use]
    pub fn constraint(mut self, constraint: &str) -> Self {
        self.constraints.push(constraint.to_string());
        self
    }

    #[must_use]
    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    #[must_use]
    pub fn tool_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Cap on decide→act rounds per turn.
    #[must_use]
    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    #[must_use]
    pub fn build(self) -> AgentNode {
        AgentNode::from_parts(
            self.name,
            self.identity,
            self.responsibilities,
            self.constraints,
            self.tools,
            self.infer,
            self.max_rounds,
        )
    }
}
