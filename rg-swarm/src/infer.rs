//! The structured-output inference seam.
//!
//! Every place the swarm needs judgment (an agent deciding its next
//! action, a grader scoring chunks, a mock lookup fabricating a record)
//! goes through [`StructuredInfer`]: instruction in, JSON value matching
//! an optional schema hint out. The trait is the system's only model
//! boundary; implementations may be live clients, heuristics, or test
//! scripts. Callers must treat failures as transient and fall back to a
//! documented default for their call site.
//!
//! Implementations should be deterministic functions of their input
//! where possible: a node re-entered after a suspension replays from its
//! start, and the replay must reach the same tool-call boundary.

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use thiserror::Error;

/// Schema hints passed by call sites so implementations can dispatch
/// without parsing instructions.
pub mod schema {
    pub const AGENT_DECISION: &str = "agent_decision";
    pub const COLLECTION_NAMES: &str = "collection_names";
    pub const QUERY_ANALYSIS: &str = "query_analysis";
    pub const CHUNK_STRATEGY: &str = "chunk_strategy";
    pub const RETRIEVED_CHUNKS: &str = "retrieved_chunks";
    pub const GRADED_CHUNKS: &str = "graded_chunks";
    pub const REWRITTEN_QUERY: &str = "rewritten_query";
    pub const ENRICHED_CHUNKS: &str = "enriched_chunks";
    pub const RERANKED_CHUNKS: &str = "reranked_chunks";
    pub const GENERATED_RESPONSE: &str = "generated_response";
    pub const QUALITY_VALIDATION: &str = "quality_validation";
    pub const WEATHER_REPORT: &str = "weather_report";
    pub const CASE_RECORD: &str = "case_record";
    pub const DOCKET_RECORD: &str = "docket_record";
    pub const WEB_SEARCH: &str = "web_search";
}

#[derive(Debug, Error, Diagnostic)]
pub enum InferError {
    #[error("inference backend unavailable: {0}")]
    #[diagnostic(code(rg_swarm::infer::unavailable))]
    Unavailable(String),

    #[error("scripted inference exhausted (no value queued for {schema:?})")]
    #[diagnostic(
        code(rg_swarm::infer::exhausted),
        help("Queue enough values on the ScriptedInfer for every call, replays included.")
    )]
    Exhausted { schema: String },
}

/// Structured-output inference: a pure request/response function with
/// unspecified latency and a non-zero failure rate.
#[async_trait]
pub trait StructuredInfer: Send + Sync {
    async fn infer(
        &self,
        instruction: &str,
        schema: Option<&'static str>,
        context: &Value,
    ) -> Result<Value, InferError>;
}

/// Test/demo implementation that pops pre-queued values in call order.
///
/// The queue must account for node replays: a node re-entered after a
/// suspension issues its pre-suspension calls again.
#[derive(Default)]
pub struct ScriptedInfer {
    queue: Mutex<VecDeque<Value>>,
}

impl ScriptedInfer {
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            queue: Mutex::new(values.into()),
        }
    }

    /// Append one more scripted value.
    pub fn push(&self, value: Value) {
        self.queue.lock().unwrap().push_back(value);
    }

    /// Number of values not yet consumed.
    pub fn remaining(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

#[async_trait]
impl StructuredInfer for ScriptedInfer {
    async fn infer(
        &self,
        _instruction: &str,
        schema: Option<&'static str>,
        _context: &Value,
    ) -> Result<Value, InferError> {
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| InferError::Exhausted {
                schema: schema.unwrap_or("free_text").to_string(),
            })
    }
}

/// Implementation that always fails, exercising every call site's
/// documented fallback path.
pub struct UnavailableInfer;

#[async_trait]
impl StructuredInfer for UnavailableInfer {
    async fn infer(
        &self,
        _instruction: &str,
        _schema: Option<&'static str>,
        _context: &Value,
    ) -> Result<Value, InferError> {
        Err(InferError::Unavailable("no backend configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn scripted_pops_in_order() {
        let infer = ScriptedInfer::new(vec![json!(1), json!(2)]);
        assert_eq!(
            infer.infer("a", None, &Value::Null).await.unwrap(),
            json!(1)
        );
        assert_eq!(
            infer.infer("b", None, &Value::Null).await.unwrap(),
            json!(2)
        );
        assert!(matches!(
            infer.infer("c", None, &Value::Null).await,
            Err(InferError::Exhausted { .. })
        ));
    }
}
