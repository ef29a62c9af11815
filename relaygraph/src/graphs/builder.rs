//! Fluent builder for workflow graphs.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::edges::{ConditionalEdge, EdgePredicate};
use crate::node::Node;
use crate::runtimes::RuntimeConfig;
use crate::types::NodeKind;

/// Builder for workflow graphs.
///
/// Every graph needs at least one node, an edge from `NodeKind::Start`
/// defining the entry frontier, and a path to `NodeKind::End`. `Start`
/// and `End` are virtual and must not be registered as nodes.
///
/// Nodes that hand control to other nodes at run time (via frontier
/// commands) should declare their destination set with
/// [`with_destinations`](Self::with_destinations); compilation rejects
/// destinations that are not registered nodes, so bad handoff wiring
/// fails before any run starts.
pub struct GraphBuilder {
    pub(crate) nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    pub(crate) edges: FxHashMap<NodeKind, Vec<NodeKind>>,
    pub(crate) conditional_edges: Vec<ConditionalEdge>,
    pub(crate) destinations: FxHashMap<NodeKind, Vec<NodeKind>>,
    pub(crate) runtime_config: RuntimeConfig,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            edges: FxHashMap::default(),
            conditional_edges: Vec::new(),
            destinations: FxHashMap::default(),
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Register an executable node. Registering the virtual `Start`/`End`
    /// kinds is ignored with a warning.
    #[must_use]
    pub fn add_node(mut self, id: NodeKind, node: impl Node + 'static) -> Self {
        match id {
            NodeKind::Start | NodeKind::End => {
                tracing::warn!(?id, "ignoring registration of virtual node kind");
            }
            _ => {
                self.nodes.insert(id, Arc::new(node));
            }
        }
        self
    }

    /// Add a static edge. When `from` completes, `to` joins the next
    /// frontier (unless `from` replaced its frontier explicitly).
    #[must_use]
    pub fn add_edge(mut self, from: NodeKind, to: NodeKind) -> Self {
        self.edges.entry(from).or_default().push(to);
        self
    }

    /// Add a conditional edge evaluated against the post-step snapshot.
    #[must_use]
    pub fn add_conditional_edge(mut self, from: NodeKind, predicate: EdgePredicate) -> Self {
        self.conditional_edges
            .push(ConditionalEdge::new(from, predicate));
        self
    }

    /// Declare the set of nodes `from` may route to at run time.
    /// Checked at compile time; a frontier command naming a node outside
    /// the graph still fails at run time as a stale route.
    #[must_use]
    pub fn with_destinations(mut self, from: NodeKind, destinations: Vec<NodeKind>) -> Self {
        self.destinations.insert(from, destinations);
        self
    }

    #[must_use]
    pub fn with_runtime_config(mut self, runtime_config: RuntimeConfig) -> Self {
        self.runtime_config = runtime_config;
        self
    }
}
