//! # Relaygraph: graph-driven conversational agent runtime
//!
//! Relaygraph executes stateful, resumable conversation workflows as
//! directed graphs with versioned state and deterministic barrier
//! merges. It was built to host agent swarms: nodes hand control to
//! each other through frontier commands, a thread's state is
//! checkpointed after every step, and any node can suspend its thread
//! pending external input and be resumed later at the exact tool-call
//! boundary that paused it.
//!
//! ## Core concepts
//!
//! - **Nodes**: async units of work consuming a [`state::StateSnapshot`]
//!   and returning either a partial update or a suspension
//! - **State**: three versioned channels (transcript, domain fields,
//!   error events) mutated only through reducers at the barrier
//! - **Graph**: declarative topology with static edges, conditional
//!   edges, and compile-time validated handoff destination sets
//! - **Runner**: one logical thread of control per session id,
//!   sequential node execution, thread-keyed checkpointing,
//!   suspend/resume keyed by tool-call id
//!
//! ## Building a workflow
//!
//! ```
//! use relaygraph::graphs::GraphBuilder;
//! use relaygraph::message::Message;
//! use relaygraph::node::{Node, NodeContext, NodeError, NodeOutput, NodePartial};
//! use relaygraph::state::StateSnapshot;
//! use relaygraph::types::NodeKind;
//! use async_trait::async_trait;
//!
//! struct GreetingNode;
//!
//! #[async_trait]
//! impl Node for GreetingNode {
//!     async fn run(
//!         &self,
//!         _snapshot: StateSnapshot,
//!         _ctx: NodeContext,
//!     ) -> Result<NodeOutput, NodeError> {
//!         let partial = NodePartial::new().with_messages(vec![Message::assistant("Hello!")]);
//!         Ok(partial.into())
//!     }
//! }
//!
//! let app = GraphBuilder::new()
//!     .add_node(NodeKind::Custom("greet".into()), GreetingNode)
//!     .add_edge(NodeKind::Start, NodeKind::Custom("greet".into()))
//!     .add_edge(NodeKind::Custom("greet".into()), NodeKind::End)
//!     .compile()
//!     .unwrap();
//! # let _ = app;
//! ```

pub mod app;
pub mod channels;
pub mod control;
pub mod event_bus;
pub mod graphs;
pub mod message;
pub mod node;
pub mod reducers;
pub mod runtimes;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod utils;

pub use control::FrontierCommand;
