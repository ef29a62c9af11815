//! Pipeline state for the RAG refinement loop.
//!
//! `RagState` lives in the extra channel (under [`fields::RAG_STATE`])
//! for the duration of one pipeline invocation and is merged back into
//! the caller's domain fields on exit. Stages never mutate a previous
//! stage's chunk list in place: retrieval, grading, enrichment, and
//! reranking each produce a new typed list.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use relaygraph::node::{NodeError, NodePartial};
use relaygraph::state::StateSnapshot;
use relaygraph::utils::collections::new_extra_map;

use crate::fields;

/// Grading average below this triggers the relevance-driven rewrite loop.
pub const RELEVANCE_THRESHOLD: f64 = 0.6;
/// Validation score above this accepts the generated answer.
pub const QUALITY_THRESHOLD: f64 = 0.7;
/// Default rewrite budget shared by both feedback loops.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    #[default]
    Legislation,
    Ruling,
    Resolution,
    Jurisprudence,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryComplexity {
    Simple,
    #[default]
    Medium,
    Complex,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    #[default]
    Recursive,
    Semantic,
    Sdpm,
    Late,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub content: String,
    pub source: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradedChunk {
    pub chunk: RetrievedChunk,
    pub relevance_score: f64,
    pub confidence: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrichedChunk {
    pub chunk: RetrievedChunk,
    pub semantic_relevance: f64,
    pub temporal_relevance: f64,
    pub topic_relevance: f64,
    pub enriched_context: String,
    pub cross_references: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RerankedChunk {
    pub chunk: EnrichedChunk,
    pub final_score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub document_type: QueryType,
    pub excerpt: String,
    pub confidence: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentToIngest {
    pub document_id: String,
    pub document_type: String,
    pub source_ref: String,
}

/// State threaded through the refinement pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagState {
    pub original_query: String,
    pub processed_query: String,
    pub query_type: QueryType,
    pub complexity: QueryComplexity,

    /// Source documents referenced by this user.
    pub source_refs: Vec<String>,
    /// Document ids already ingested for this user.
    pub seen_documents: Vec<String>,
    pub ingestion_required: bool,
    pub documents_to_ingest: Vec<DocumentToIngest>,

    pub selected_chunker: ChunkStrategy,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub collection_names: Vec<String>,

    pub retrieved_chunks: Vec<RetrievedChunk>,
    pub graded_chunks: Vec<GradedChunk>,
    pub enriched_chunks: Vec<EnrichedChunk>,
    pub reranked_chunks: Vec<RerankedChunk>,

    pub generated_response: String,
    pub citations: Vec<Citation>,
    pub quality_score: f64,

    pub needs_rewrite: bool,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Number of retrieval passes so far (initial + rewrites).
    pub retrieval_passes: u32,

    /// Set by query analysis when the query belongs to a sibling agent;
    /// short-circuits the pipeline to the handoff exit.
    pub handoff_to_agent: Option<String>,
}

impl Default for RagState {
    fn default() -> Self {
        Self {
            original_query: String::new(),
            processed_query: String::new(),
            query_type: QueryType::default(),
            complexity: QueryComplexity::default(),
            source_refs: Vec::new(),
            seen_documents: Vec::new(),
            ingestion_required: false,
            documents_to_ingest: Vec::new(),
            selected_chunker: ChunkStrategy::default(),
            chunk_size: 512,
            chunk_overlap: 50,
            collection_names: Vec::new(),
            retrieved_chunks: Vec::new(),
            graded_chunks: Vec::new(),
            enriched_chunks: Vec::new(),
            reranked_chunks: Vec::new(),
            generated_response: String::new(),
            citations: Vec::new(),
            quality_score: 0.0,
            needs_rewrite: false,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            retrieval_passes: 0,
            handoff_to_agent: None,
        }
    }
}

impl RagState {
    /// Fresh state for one incoming query.
    #[must_use]
    pub fn for_query(
        query: &str,
        source_refs: Vec<String>,
        seen_documents: Vec<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            original_query: query.to_string(),
            processed_query: query.to_string(),
            source_refs,
            seen_documents,
            max_retries,
            ..Self::default()
        }
    }

    /// Deserialize from the extra channel; missing state is a wiring
    /// error inside the pipeline graph.
    pub fn load(snapshot: &StateSnapshot) -> Result<Self, NodeError> {
        let value = snapshot
            .extra
            .get(fields::RAG_STATE)
            .ok_or(NodeError::MissingInput {
                what: "rag_state in extra channel",
            })?;
        serde_json::from_value(value.clone()).map_err(NodeError::Serde)
    }

    /// Best-effort read for edge predicates; absent state reads as default.
    #[must_use]
    pub fn peek(snapshot: &StateSnapshot) -> Self {
        snapshot
            .extra
            .get(fields::RAG_STATE)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Serialize back into a partial update for the extra channel.
    #[must_use]
    pub fn into_partial(self) -> NodePartial {
        let mut extra = new_extra_map();
        let value = serde_json::to_value(&self).expect("RagState serializes");
        extra.insert(fields::RAG_STATE.to_string(), value);
        NodePartial::new().with_extra(extra)
    }

    /// Invariant check used by the loop nodes: the budget is never
    /// exceeded, and at the cap a rewrite can no longer be requested.
    #[must_use]
    pub fn at_retry_cap(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

/// Document id for a source ref: file stem without directory or extension.
#[must_use]
pub fn document_id(source_ref: &str) -> String {
    let name = source_ref.rsplit('/').next().unwrap_or(source_ref);
    name.split('.').next().unwrap_or(name).to_string()
}

/// Read a string array out of a JSON value, tolerating absence.
#[must_use]
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
