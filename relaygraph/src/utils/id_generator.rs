//! Id generation.
//!
//! Session/run ids are random uuids. Tool-call ids are NOT random: they
//! are derived from `(node, step, call index)` so that re-entering a
//! suspended node reproduces the id recorded at suspension time, which
//! is what lets a resume payload pair with the exact call site.

use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct IdGenerator;

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Random id for a one-shot run.
    #[must_use]
    pub fn generate_run_id(&self) -> String {
        format!("run-{}", Uuid::new_v4())
    }

    /// Random id for a conversation thread.
    #[must_use]
    pub fn generate_thread_id(&self) -> String {
        format!("thread-{}", Uuid::new_v4())
    }

    /// Deterministic, replay-stable id for a tool call.
    #[must_use]
    pub fn tool_call_id(node_id: &str, step: u64, call_index: usize) -> String {
        format!("call-{node_id}-{step}-{call_index}")
    }
}
