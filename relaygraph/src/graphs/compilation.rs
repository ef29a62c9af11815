//! Graph compilation and structural validation.
//!
//! Wiring mistakes are configuration errors: they are rejected here,
//! before any run starts, never patched over at call time.

use miette::Diagnostic;
use thiserror::Error;

use crate::app::App;
use crate::types::NodeKind;

/// Structural errors detected while compiling a graph.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphCompileError {
    #[error("graph has no edges from Start; nothing would ever run")]
    #[diagnostic(
        code(relaygraph::graphs::no_entry),
        help("Add an edge from NodeKind::Start to the entry node.")
    )]
    NoEntryEdge,

    #[error("edge starts at unregistered node {from:?}")]
    #[diagnostic(code(relaygraph::graphs::unknown_edge_source))]
    UnknownEdgeSource { from: String },

    #[error("edge references unregistered node {node:?} (from {from:?})")]
    #[diagnostic(code(relaygraph::graphs::unknown_edge_target))]
    UnknownEdgeTarget { from: String, node: String },

    #[error("conditional edge starts at unregistered node {from:?}")]
    #[diagnostic(code(relaygraph::graphs::unknown_conditional_source))]
    UnknownConditionalSource { from: String },

    #[error("node {from:?} declares handoff destination {destination:?} which is not registered")]
    #[diagnostic(
        code(relaygraph::graphs::unknown_destination),
        help("Handoff targets must be nodes of the same graph; fix the destination set.")
    )]
    UnknownDestination { from: String, destination: String },
}

impl super::builder::GraphBuilder {
    /// Validate and compile the graph into an executable [`App`].
    pub fn compile(self) -> Result<App, GraphCompileError> {
        let registered = |kind: &NodeKind| match kind {
            NodeKind::Start | NodeKind::End => true,
            custom => self.nodes.contains_key(custom),
        };

        if self
            .edges
            .get(&NodeKind::Start)
            .map(Vec::is_empty)
            .unwrap_or(true)
        {
            return Err(GraphCompileError::NoEntryEdge);
        }

        for (from, targets) in &self.edges {
            if !registered(from) {
                return Err(GraphCompileError::UnknownEdgeSource {
                    from: from.encode(),
                });
            }
            for to in targets {
                if !registered(to) {
                    return Err(GraphCompileError::UnknownEdgeTarget {
                        from: from.encode(),
                        node: to.encode(),
                    });
                }
            }
        }

        for edge in &self.conditional_edges {
            if !registered(edge.from()) {
                return Err(GraphCompileError::UnknownConditionalSource {
                    from: edge.from().encode(),
                });
            }
        }

        for (from, destinations) in &self.destinations {
            for destination in destinations {
                if !self.nodes.contains_key(destination) {
                    return Err(GraphCompileError::UnknownDestination {
                        from: from.encode(),
                        destination: destination.encode(),
                    });
                }
            }
        }

        Ok(App::from_parts(
            self.nodes,
            self.edges,
            self.conditional_edges,
            self.runtime_config,
        ))
    }
}
