//! Edge types and routing predicates for conditional graph flow.

use crate::types::NodeKind;
use std::sync::Arc;

/// Predicate for conditional routing: inspects a
/// [`StateSnapshot`](crate::state::StateSnapshot) and returns the names
/// of the nodes to run next ("End" routes to the virtual exit).
///
/// ```
/// use relaygraph::graphs::EdgePredicate;
/// use std::sync::Arc;
///
/// let needs_rewrite: EdgePredicate = Arc::new(|snapshot| {
///     let rewrite = snapshot
///         .extra
///         .get("needs_rewrite")
///         .and_then(|v| v.as_bool())
///         .unwrap_or(false);
///     if rewrite {
///         vec!["query_rewrite".to_string()]
///     } else {
///         vec!["context_enrichment".to_string()]
///     }
/// });
/// ```
pub type EdgePredicate =
    Arc<dyn Fn(crate::state::StateSnapshot) -> Vec<String> + Send + Sync + 'static>;

/// A conditional edge: evaluated after its source node ran, unless the
/// node replaced its frontier explicitly.
#[derive(Clone)]
pub struct ConditionalEdge {
    from: NodeKind,
    predicate: EdgePredicate,
}

impl ConditionalEdge {
    pub fn new(from: impl Into<NodeKind>, predicate: EdgePredicate) -> Self {
        Self {
            from: from.into(),
            predicate,
        }
    }

    pub fn from(&self) -> &NodeKind {
        &self.from
    }

    pub fn predicate(&self) -> &EdgePredicate {
        &self.predicate
    }
}
