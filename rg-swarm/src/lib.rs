//! # rg-swarm: a multi-agent conversation swarm on relaygraph
//!
//! Five specialized agents (a coordinator, a math specialist, a
//! weather specialist, a process-search specialist, and a RAG
//! refinement pipeline) cooperate on one user task, transferring
//! control between each other while sharing and selectively propagating
//! conversation state.
//!
//! The moving parts:
//!
//! - **Handoffs** ([`handoff`]): an agent ends its turn and names its
//!   successor, either forwarding the full transcript (state-propagating)
//!   or seeding the target with a single synthesized task (task-framed).
//! - **Active-agent routing** ([`router`]): every turn enters at the
//!   router, which dispatches to whichever agent owns the thread, so
//!   callers never track the conversation's owner themselves.
//! - **Human-in-the-loop** ([`tools::human`]): an agent can pause its
//!   thread on a question; the thread resumes later at the exact tool
//!   call that paused it, keyed by tool-call id.
//! - **RAG refinement** ([`rag`]): retrieval, grading, enrichment,
//!   reranking, generation, and validation with two rewrite loops
//!   bounded by one shared retry budget.
//!
//! Model access goes exclusively through the [`infer::StructuredInfer`]
//! seam; the crate ships deterministic implementations for tests and
//! offline use.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use rg_swarm::infer::UnavailableInfer;
//! use rg_swarm::swarm::{SwarmRunner, TurnOutcome, build_swarm_app};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = build_swarm_app(Arc::new(UnavailableInfer))?;
//! let mut runner = SwarmRunner::new(app).await;
//!
//! match runner.invoke("thread-1", "What is 12 * 4?").await? {
//!     TurnOutcome::Complete(state) => {
//!         for message in state.snapshot().messages {
//!             println!("{}: {}", message.role, message.content);
//!         }
//!     }
//!     TurnOutcome::Suspended { question, tool_call_id } => {
//!         println!("needs input ({tool_call_id}): {question}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod agents;
pub mod fields;
pub mod handoff;
pub mod infer;
pub mod rag;
pub mod router;
pub mod swarm;
pub mod tools;
