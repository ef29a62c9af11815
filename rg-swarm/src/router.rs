//! Active-agent router: the unique entry point of the swarm graph.
//!
//! Every external invocation, fresh turns and post-suspension resumes
//! alike, enters here. The router reads `active_agent` from state and
//! redirects execution: unset routes to the configured default (and
//! records it), a known agent routes there unconditionally, and an
//! unknown agent is a fatal stale-route error so operators notice
//! configuration drift in persisted threads instead of a silent
//! fallback.

use async_trait::async_trait;
use serde_json::json;

use relaygraph::control::FrontierCommand;
use relaygraph::node::{Node, NodeContext, NodeError, NodeOutput, NodePartial};
use relaygraph::state::{ACTIVE_AGENT_KEY, StateSnapshot};
use relaygraph::types::NodeKind;
use relaygraph::utils::collections::new_extra_map;

pub struct ActiveAgentRouter {
    route_to: Vec<String>,
    default_agent: String,
}

impl ActiveAgentRouter {
    #[must_use]
    pub fn new(route_to: Vec<String>, default_agent: &str) -> Self {
        Self {
            route_to,
            default_agent: default_agent.to_string(),
        }
    }
}

#[async_trait]
impl Node for ActiveAgentRouter {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        match snapshot.active_agent() {
            None => {
                ctx.emit("route", format!("default -> {}", self.default_agent))?;
                let mut extra = new_extra_map();
                extra.insert(ACTIVE_AGENT_KEY.to_string(), json!(self.default_agent));
                let partial = NodePartial::new()
                    .with_extra(extra)
                    .with_frontier(FrontierCommand::goto(NodeKind::Custom(
                        self.default_agent.clone(),
                    )));
                Ok(partial.into())
            }
            Some(agent) if self.route_to.iter().any(|r| r == agent) => {
                ctx.emit("route", agent.to_string())?;
                let partial = NodePartial::new().with_frontier(FrontierCommand::goto(
                    NodeKind::Custom(agent.to_string()),
                ));
                Ok(partial.into())
            }
            Some(stale) => Err(NodeError::StaleRoute {
                agent: stale.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaygraph::state::VersionedState;

    fn ctx() -> (NodeContext, flume::Receiver<relaygraph::event_bus::Event>) {
        let (tx, rx) = flume::unbounded();
        (
            NodeContext {
                node_id: "router".into(),
                step: 1,
                event_sender: tx,
                resume: None,
            },
            rx,
        )
    }

    fn router() -> ActiveAgentRouter {
        ActiveAgentRouter::new(
            vec!["coordinator".into(), "math_specialist".into()],
            "coordinator",
        )
    }

    #[tokio::test]
    async fn unset_routes_to_default_and_records_it() {
        let state = VersionedState::new_with_user_message("hi");
        let (ctx, _events) = ctx();
        let output = router().run(state.snapshot(), ctx).await.unwrap();
        let NodeOutput::Update(partial) = output else {
            panic!("expected update");
        };
        assert_eq!(
            partial.frontier,
            Some(FrontierCommand::goto(NodeKind::Custom("coordinator".into())))
        );
        assert_eq!(
            partial.extra.unwrap().get(ACTIVE_AGENT_KEY),
            Some(&json!("coordinator"))
        );
    }

    #[tokio::test]
    async fn set_routes_unconditionally() {
        let mut state = VersionedState::new_with_user_message("hi");
        state.add_extra(ACTIVE_AGENT_KEY, json!("math_specialist"));
        let (ctx, _events) = ctx();
        let output = router().run(state.snapshot(), ctx).await.unwrap();
        let NodeOutput::Update(partial) = output else {
            panic!("expected update");
        };
        assert_eq!(
            partial.frontier,
            Some(FrontierCommand::goto(NodeKind::Custom(
                "math_specialist".into()
            )))
        );
    }

    #[tokio::test]
    async fn unknown_agent_is_stale_route() {
        let mut state = VersionedState::new_with_user_message("hi");
        state.add_extra(ACTIVE_AGENT_KEY, json!("removed_agent"));
        let (ctx, _events) = ctx();
        let err = router().run(state.snapshot(), ctx).await.unwrap_err();
        assert!(matches!(err, NodeError::StaleRoute { .. }));
    }
}
