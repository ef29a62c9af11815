//! Compiled workflow graph and barrier application.
//!
//! An [`App`] is the immutable product of
//! [`GraphBuilder::compile`](crate::graphs::GraphBuilder::compile): the
//! node registry, edge tables, and reducer registry. Execution lives in
//! [`AppRunner`](crate::runtimes::AppRunner); the app's own job at run
//! time is applying node partials at the barrier in deterministic order.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::channels::Channel;
use crate::channels::errors::ErrorEvent;
use crate::control::FrontierCommand;
use crate::graphs::ConditionalEdge;
use crate::node::{Node, NodePartial};
use crate::reducers::{ReducerRegistry, channel_guard};
use crate::runtimes::RuntimeConfig;
use crate::state::VersionedState;
use crate::types::{ChannelType, NodeKind};

/// Compiled graph: topology plus merge strategies.
#[derive(Clone)]
pub struct App {
    nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    edges: FxHashMap<NodeKind, Vec<NodeKind>>,
    conditional_edges: Vec<ConditionalEdge>,
    reducer_registry: ReducerRegistry,
    runtime_config: RuntimeConfig,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("edges", &self.edges)
            .field("conditional_edges", &self.conditional_edges.len())
            .field("runtime_config", &self.runtime_config)
            .finish_non_exhaustive()
    }
}

/// Result of applying node partials at a barrier.
///
/// Updates and errors are aggregated in execution order so callers
/// (runner, checkpointers, tests) observe stable behavior across runs.
#[derive(Debug, Clone, Default)]
pub struct BarrierOutcome {
    /// Channels updated during this barrier.
    pub updated_channels: Vec<ChannelType>,
    /// Error events recorded by nodes in this step.
    pub errors: Vec<ErrorEvent>,
    /// Frontier commands in emission order, tagged with their origin.
    pub frontier_commands: Vec<(NodeKind, FrontierCommand)>,
}

impl App {
    pub(crate) fn from_parts(
        nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
        edges: FxHashMap<NodeKind, Vec<NodeKind>>,
        conditional_edges: Vec<ConditionalEdge>,
        runtime_config: RuntimeConfig,
    ) -> Self {
        Self {
            nodes,
            edges,
            conditional_edges,
            reducer_registry: ReducerRegistry::default(),
            runtime_config,
        }
    }

    pub fn nodes(&self) -> &FxHashMap<NodeKind, Arc<dyn Node>> {
        &self.nodes
    }

    pub fn edges(&self) -> &FxHashMap<NodeKind, Vec<NodeKind>> {
        &self.edges
    }

    pub fn conditional_edges(&self) -> &[ConditionalEdge] {
        &self.conditional_edges
    }

    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.runtime_config
    }

    /// Merge the partials produced by one superstep into `state`.
    ///
    /// Partials are applied in the order their nodes ran. A channel's
    /// version is bumped once per barrier if any partial touched it.
    pub fn apply_barrier(
        &self,
        state: &mut VersionedState,
        ran: &[NodeKind],
        partials: Vec<NodePartial>,
    ) -> Result<BarrierOutcome, crate::reducers::ReducerError> {
        let mut outcome = BarrierOutcome::default();
        let mut touched: Vec<ChannelType> = Vec::new();

        for (origin, partial) in ran.iter().zip(partials.iter()) {
            for channel in [ChannelType::Message, ChannelType::Extra, ChannelType::Error] {
                if channel_guard(&channel, partial) && !touched.contains(&channel) {
                    touched.push(channel.clone());
                }
                self.reducer_registry
                    .try_update(channel, state, partial)?;
            }
            if let Some(errors) = &partial.errors {
                outcome.errors.extend(errors.iter().cloned());
            }
            if let Some(command) = &partial.frontier {
                outcome
                    .frontier_commands
                    .push((origin.clone(), command.clone()));
            }
        }

        for channel in &touched {
            match channel {
                ChannelType::Message => {
                    let v = state.messages.version();
                    state.messages.set_version(v + 1);
                }
                ChannelType::Extra => {
                    let v = state.extra.version();
                    state.extra.set_version(v + 1);
                }
                ChannelType::Error => {
                    let v = state.errors.version();
                    state.errors.set_version(v + 1);
                }
            }
        }
        outcome.updated_channels = touched;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::utils::collections::new_extra_map;
    use serde_json::json;

    fn empty_app() -> App {
        App::from_parts(
            FxHashMap::default(),
            FxHashMap::default(),
            Vec::new(),
            RuntimeConfig::default(),
        )
    }

    #[test]
    fn barrier_bumps_versions_once() {
        let app = empty_app();
        let mut state = VersionedState::new_with_user_message("hi");
        let node = NodeKind::Custom("a".into());

        let mut extra = new_extra_map();
        extra.insert("k".into(), json!(1));
        let partials = vec![
            NodePartial::new().with_messages(vec![Message::assistant("one")]),
            NodePartial::new()
                .with_messages(vec![Message::assistant("two")])
                .with_extra(extra),
        ];

        let outcome = app
            .apply_barrier(&mut state, &[node.clone(), node], partials)
            .unwrap();

        assert_eq!(state.messages.version(), 2);
        assert_eq!(state.extra.version(), 2);
        assert_eq!(state.snapshot().messages.len(), 3);
        assert!(outcome.updated_channels.contains(&ChannelType::Message));
        assert!(outcome.updated_channels.contains(&ChannelType::Extra));
    }

    #[test]
    fn frontier_commands_keep_emission_order() {
        let app = empty_app();
        let mut state = VersionedState::new_with_user_message("hi");
        let a = NodeKind::Custom("a".into());
        let b = NodeKind::Custom("b".into());

        let partials = vec![
            NodePartial::new().with_frontier(FrontierCommand::goto("x")),
            NodePartial::new().with_frontier(FrontierCommand::goto("y")),
        ];
        let outcome = app
            .apply_barrier(&mut state, &[a.clone(), b.clone()], partials)
            .unwrap();
        assert_eq!(outcome.frontier_commands[0].0, a);
        assert_eq!(outcome.frontier_commands[1].0, b);
    }
}
