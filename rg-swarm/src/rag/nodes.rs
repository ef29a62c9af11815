//! Pipeline stage nodes.
//!
//! Every stage loads [`RagState`] from the extra channel, does its work
//! through the inference seam, and stores the updated state. Inference
//! failures are recovered locally: each call site has a documented
//! fallback value, so a degraded backend yields a degraded answer, never
//! a pipeline failure.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use relaygraph::message::Message;
use relaygraph::node::{Node, NodeContext, NodeError, NodeOutput};
use relaygraph::state::StateSnapshot;

use crate::infer::{StructuredInfer, schema};

use super::state::{
    Citation, DocumentToIngest, EnrichedChunk, GradedChunk, QueryComplexity, QueryType,
    RagState, RerankedChunk, RetrievedChunk, ChunkStrategy, RELEVANCE_THRESHOLD, document_id,
};

fn as_f64(value: Option<&Value>, default: f64) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(default)
}

fn as_str_or<'a>(value: Option<&'a Value>, default: &'a str) -> &'a str {
    value.and_then(Value::as_str).unwrap_or(default)
}

/// Determines the vector collections in scope for this query.
pub struct SetupNode {
    pub(super) infer: Arc<dyn StructuredInfer>,
}

#[async_trait]
impl Node for SetupNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let mut rag = RagState::load(&snapshot)?;
        let context = json!({
            "query": rag.processed_query,
            "source_refs": rag.source_refs,
        });
        let names = self
            .infer
            .infer(
                "Name the vector collections in scope for this query.",
                Some(schema::COLLECTION_NAMES),
                &context,
            )
            .await
            .ok()
            .map(|v| super::state::string_list(Some(&v)))
            .filter(|names| !names.is_empty())
            // Fallback: the shared global collection.
            .unwrap_or_else(|| vec!["global".to_string()]);
        rag.collection_names = names;
        Ok(rag.into_partial().into())
    }
}

/// Classifies the query, decides whether ingestion is needed, and
/// detects queries that belong to a sibling agent.
pub struct QueryAnalysisNode {
    pub(super) infer: Arc<dyn StructuredInfer>,
}

#[async_trait]
impl Node for QueryAnalysisNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let mut rag = RagState::load(&snapshot)?;

        // Local check decides ingestion, whatever the model suggests:
        // any referenced source this user has not seen needs ingesting.
        let unseen: Vec<String> = rag
            .source_refs
            .iter()
            .filter(|r| !rag.seen_documents.contains(&document_id(r.as_str())))
            .cloned()
            .collect();
        let needs_ingestion = !unseen.is_empty();

        let instruction = "Classify the query for document retrieval. If it is really a \
             process/docket lookup or a capability question, name the agent to hand off to.";
        let context = json!({
            "query": rag.processed_query,
            "source_refs": rag.source_refs,
            "seen_documents": rag.seen_documents,
        });
        let analysis = self
            .infer
            .infer(instruction, Some(schema::QUERY_ANALYSIS), &context)
            .await
            // Fallback: keep the query as-is with default classification.
            .unwrap_or_else(|_| json!({}));

        if let Some(target) = analysis
            .get("handoff_to_agent")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
        {
            ctx.emit("analysis", format!("out of domain, handoff to {target}"))?;
            rag.handoff_to_agent = Some(target.to_string());
            return Ok(rag.into_partial().into());
        }

        if let Some(processed) = analysis.get("processed_query").and_then(Value::as_str) {
            if !processed.trim().is_empty() {
                rag.processed_query = processed.to_string();
            }
        }
        rag.query_type = analysis
            .get("query_type")
            .and_then(|v| serde_json::from_value::<QueryType>(v.clone()).ok())
            .unwrap_or_default();
        rag.complexity = analysis
            .get("complexity")
            .and_then(|v| serde_json::from_value::<QueryComplexity>(v.clone()).ok())
            .unwrap_or_default();

        rag.ingestion_required = needs_ingestion;
        rag.documents_to_ingest = unseen
            .iter()
            .map(|source_ref| DocumentToIngest {
                document_id: document_id(source_ref),
                document_type: source_ref
                    .rsplit('.')
                    .next()
                    .unwrap_or("txt")
                    .to_string(),
                source_ref: source_ref.clone(),
            })
            .collect();

        Ok(rag.into_partial().into())
    }
}

/// Exit node for out-of-domain queries: the pipeline stops here and the
/// enclosing agent node re-emits the transfer at parent scope.
pub struct HandoffExitNode;

#[async_trait]
impl Node for HandoffExitNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let rag = RagState::load(&snapshot)?;
        if let Some(target) = &rag.handoff_to_agent {
            ctx.emit("handoff", target.clone())?;
        }
        Ok(rag.into_partial().into())
    }
}

/// Picks the chunking strategy for the documents about to be ingested.
pub struct ChunkStrategyNode {
    pub(super) infer: Arc<dyn StructuredInfer>,
}

#[async_trait]
impl Node for ChunkStrategyNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let mut rag = RagState::load(&snapshot)?;
        let context = json!({
            "query_type": rag.query_type,
            "complexity": rag.complexity,
            "documents": rag.documents_to_ingest,
        });
        let strategy = self
            .infer
            .infer(
                "Select a chunking strategy (recursive, semantic, sdpm, late) \
                 with chunk size and overlap.",
                Some(schema::CHUNK_STRATEGY),
                &context,
            )
            .await
            // Fallback: recursive 512/50.
            .unwrap_or_else(|_| json!({}));

        rag.selected_chunker = strategy
            .get("selected_chunker")
            .and_then(|v| serde_json::from_value::<ChunkStrategy>(v.clone()).ok())
            .unwrap_or_default();
        rag.chunk_size = strategy
            .get("chunk_size")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(512);
        rag.chunk_overlap = strategy
            .get("chunk_overlap")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(50);
        Ok(rag.into_partial().into())
    }
}

/// Marks the pending documents as ingested for this user.
pub struct IngestionNode;

#[async_trait]
impl Node for IngestionNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let mut rag = RagState::load(&snapshot)?;
        let count = rag.documents_to_ingest.len();
        for doc in rag.documents_to_ingest.drain(..) {
            if !rag.seen_documents.contains(&doc.document_id) {
                rag.seen_documents.push(doc.document_id);
            }
        }
        rag.ingestion_required = false;
        ctx.emit("ingestion", format!("{count} documents ingested"))?;
        Ok(rag.into_partial().into())
    }
}

/// Retrieves candidate chunks for the processed query.
pub struct RetrievalNode {
    pub(super) infer: Arc<dyn StructuredInfer>,
}

fn fallback_chunks(query: &str) -> Vec<RetrievedChunk> {
    (1..=3)
        .map(|i| RetrievedChunk {
            chunk_id: format!("chunk-{i}"),
            content: format!("Reference excerpt {i} for: {query}"),
            source: format!("doc-{i}"),
        })
        .collect()
}

#[async_trait]
impl Node for RetrievalNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let mut rag = RagState::load(&snapshot)?;
        rag.retrieval_passes += 1;
        ctx.emit("retrieval", format!("pass {}", rag.retrieval_passes))?;

        let context = json!({
            "query": rag.processed_query,
            "collections": rag.collection_names,
            "query_type": rag.query_type,
        });
        let chunks = self
            .infer
            .infer(
                "Retrieve the most relevant chunks for the query from the \
                 collections in scope.",
                Some(schema::RETRIEVED_CHUNKS),
                &context,
            )
            .await
            .ok()
            .and_then(|v| serde_json::from_value::<Vec<RetrievedChunk>>(v).ok())
            .filter(|chunks| !chunks.is_empty())
            // Fallback: synthesized excerpts keyed to the query.
            .unwrap_or_else(|| fallback_chunks(&rag.processed_query));

        rag.retrieved_chunks = chunks;
        // Downstream stage lists are stale for this pass.
        rag.graded_chunks = Vec::new();
        rag.enriched_chunks = Vec::new();
        rag.reranked_chunks = Vec::new();
        Ok(rag.into_partial().into())
    }
}

/// Grades retrieved chunks and decides whether the relevance-driven
/// rewrite loop fires.
pub struct RelevanceGradingNode {
    pub(super) infer: Arc<dyn StructuredInfer>,
}

#[async_trait]
impl Node for RelevanceGradingNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let mut rag = RagState::load(&snapshot)?;
        let context = json!({
            "query": rag.processed_query,
            "chunks": rag.retrieved_chunks,
        });
        let grades = self
            .infer
            .infer(
                "Grade each chunk's relevance to the query in [0,1] with a confidence.",
                Some(schema::GRADED_CHUNKS),
                &context,
            )
            .await
            .ok()
            .and_then(|v| v.as_array().cloned())
            // Fallback: grade at a passing level so a degraded backend
            // cannot spin the rewrite loop.
            .unwrap_or_else(|| {
                rag.retrieved_chunks
                    .iter()
                    .map(|_| json!({"relevance_score": 0.75, "confidence": 0.5}))
                    .collect()
            });

        rag.graded_chunks = rag
            .retrieved_chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let grade = grades.get(i);
                GradedChunk {
                    chunk: chunk.clone(),
                    relevance_score: as_f64(
                        grade.and_then(|g| g.get("relevance_score")),
                        0.75,
                    )
                    .clamp(0.0, 1.0),
                    confidence: as_f64(grade.and_then(|g| g.get("confidence")), 0.5)
                        .clamp(0.0, 1.0),
                }
            })
            .collect();

        let average = if rag.graded_chunks.is_empty() {
            0.0
        } else {
            rag.graded_chunks
                .iter()
                .map(|g| g.relevance_score)
                .sum::<f64>()
                / rag.graded_chunks.len() as f64
        };
        // Both feedback loops share one budget: at the cap the rewrite
        // is forced off regardless of score.
        rag.needs_rewrite = average < RELEVANCE_THRESHOLD && !rag.at_retry_cap();
        ctx.emit(
            "grading",
            format!("average relevance {average:.2}, rewrite={}", rag.needs_rewrite),
        )?;
        Ok(rag.into_partial().into())
    }
}

/// Rewrites the processed query; consumes one unit of the shared budget.
pub struct QueryRewriteNode {
    pub(super) infer: Arc<dyn StructuredInfer>,
}

#[async_trait]
impl Node for QueryRewriteNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let mut rag = RagState::load(&snapshot)?;
        let context = json!({
            "original_query": rag.original_query,
            "current_query": rag.processed_query,
            "query_type": rag.query_type,
            "retry_count": rag.retry_count,
        });
        let rewritten = self
            .infer
            .infer(
                "Rewrite the query to be more specific and retrieval-friendly.",
                Some(schema::REWRITTEN_QUERY),
                &context,
            )
            .await
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|q| !q.trim().is_empty())
            // Fallback: keep the query, marked as refined.
            .unwrap_or_else(|| format!("{} (refined)", rag.processed_query));

        rag.processed_query = rewritten;
        rag.retry_count = (rag.retry_count + 1).min(rag.max_retries);
        rag.needs_rewrite = false;
        ctx.emit(
            "rewrite",
            format!("retry {}/{}", rag.retry_count, rag.max_retries),
        )?;
        Ok(rag.into_partial().into())
    }
}

/// Enriches graded chunks with cross-references and relevance facets.
pub struct ContextEnrichmentNode {
    pub(super) infer: Arc<dyn StructuredInfer>,
}

#[async_trait]
impl Node for ContextEnrichmentNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let mut rag = RagState::load(&snapshot)?;
        let mut candidates: Vec<&GradedChunk> = rag
            .graded_chunks
            .iter()
            .filter(|g| g.relevance_score > RELEVANCE_THRESHOLD)
            .collect();
        if candidates.is_empty() {
            // Forced-exit passes still need context to generate from.
            candidates = rag.graded_chunks.iter().collect();
        }

        let context = json!({
            "query": rag.processed_query,
            "chunks": candidates
                .iter()
                .map(|g| &g.chunk.content)
                .collect::<Vec<_>>(),
        });
        let enrichments = self
            .infer
            .infer(
                "For each chunk produce enriched context, cross-references, \
                 and temporal/topic relevance in [0,1].",
                Some(schema::ENRICHED_CHUNKS),
                &context,
            )
            .await
            .ok()
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();

        rag.enriched_chunks = candidates
            .into_iter()
            .enumerate()
            .map(|(i, graded)| {
                let e = enrichments.get(i);
                EnrichedChunk {
                    chunk: graded.chunk.clone(),
                    semantic_relevance: graded.relevance_score,
                    temporal_relevance: as_f64(e.and_then(|e| e.get("temporal_relevance")), 0.5)
                        .clamp(0.0, 1.0),
                    topic_relevance: as_f64(
                        e.and_then(|e| e.get("topic_relevance")),
                        graded.relevance_score,
                    )
                    .clamp(0.0, 1.0),
                    enriched_context: as_str_or(
                        e.and_then(|e| e.get("enriched_context")),
                        &format!(
                            "Context for: {}",
                            graded.chunk.content.chars().take(50).collect::<String>()
                        ),
                    )
                    .to_string(),
                    cross_references: super::state::string_list(
                        e.and_then(|e| e.get("cross_references")),
                    ),
                }
            })
            .collect();
        Ok(rag.into_partial().into())
    }
}

/// Ranks enriched chunks by a combined final score.
pub struct RerankingNode {
    pub(super) infer: Arc<dyn StructuredInfer>,
}

#[async_trait]
impl Node for RerankingNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let mut rag = RagState::load(&snapshot)?;
        let context = json!({
            "query": rag.processed_query,
            "chunks": rag.enriched_chunks,
        });
        let scores = self
            .infer
            .infer(
                "Assign each chunk a combined final score in [0,1], most relevant first.",
                Some(schema::RERANKED_CHUNKS),
                &context,
            )
            .await
            .ok()
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();

        let mut reranked: Vec<RerankedChunk> = rag
            .enriched_chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                // Fallback score: mean of the relevance facets.
                let fallback = (chunk.semantic_relevance
                    + chunk.temporal_relevance
                    + chunk.topic_relevance)
                    / 3.0;
                RerankedChunk {
                    chunk: chunk.clone(),
                    final_score: as_f64(
                        scores.get(i).and_then(|s| s.get("final_score")),
                        fallback,
                    )
                    .clamp(0.0, 1.0),
                }
            })
            .collect();
        reranked.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rag.reranked_chunks = reranked;
        Ok(rag.into_partial().into())
    }
}

/// Generates the answer with citations from the top-ranked chunks.
pub struct ResponseGenerationNode {
    pub(super) infer: Arc<dyn StructuredInfer>,
}

#[async_trait]
impl Node for ResponseGenerationNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let mut rag = RagState::load(&snapshot)?;

        let context_block = rag
            .reranked_chunks
            .iter()
            .enumerate()
            .map(|(i, r)| format!("[{}] {}", i + 1, r.chunk.chunk.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        rag.citations = rag
            .reranked_chunks
            .iter()
            .map(|r| Citation {
                source: r.chunk.chunk.source.clone(),
                document_type: rag.query_type.clone(),
                excerpt: r.chunk.chunk.content.chars().take(100).collect(),
                confidence: r.final_score,
            })
            .collect();

        let context = json!({
            "query": rag.original_query,
            "context": context_block,
            "query_type": rag.query_type,
        });
        let response = self
            .infer
            .infer(
                "Write a precise, formally worded answer to the query from the \
                 given context, citing sources as [n].",
                Some(schema::GENERATED_RESPONSE),
                &context,
            )
            .await
            .ok()
            .and_then(|v| match v {
                Value::String(s) => Some(s),
                other => other
                    .get("response")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
            .filter(|r| !r.trim().is_empty())
            // Fallback: answer assembled directly from the context block.
            .unwrap_or_else(|| {
                format!(
                    "Based on {} relevant sources for \"{}\":\n\n{}",
                    rag.reranked_chunks.len(),
                    rag.original_query,
                    context_block
                )
            });

        rag.generated_response = response;
        Ok(rag.into_partial().into())
    }
}

/// Scores the generated answer; the quality gate edge decides retry or exit.
pub struct QualityValidationNode {
    pub(super) infer: Arc<dyn StructuredInfer>,
}

#[async_trait]
impl Node for QualityValidationNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let mut rag = RagState::load(&snapshot)?;
        let context = json!({
            "query": rag.original_query,
            "response": rag.generated_response,
            "citations": rag.citations.len(),
            "retry_count": rag.retry_count,
        });
        let validation = self
            .infer
            .infer(
                "Validate the answer for accuracy, relevance, citation quality, \
                 and completeness; return quality_score and needs_rewrite.",
                Some(schema::QUALITY_VALIDATION),
                &context,
            )
            .await
            // Fallback: accept the answer rather than loop on a dead backend.
            .unwrap_or_else(|_| json!({"quality_score": 0.75, "needs_rewrite": false}));

        rag.quality_score = as_f64(validation.get("quality_score"), 0.75).clamp(0.0, 1.0);
        rag.needs_rewrite = validation
            .get("needs_rewrite")
            .and_then(Value::as_bool)
            .unwrap_or(false)
            && !rag.at_retry_cap();
        ctx.emit(
            "validation",
            format!("quality {:.2}", rag.quality_score),
        )?;
        Ok(rag.into_partial().into())
    }
}

/// Terminal stage: packages the generated answer as the outgoing message.
pub struct PrepareExitNode;

#[async_trait]
impl Node for PrepareExitNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let rag = RagState::load(&snapshot)?;
        let response = if rag.generated_response.trim().is_empty() {
            "No answer could be generated for this query.".to_string()
        } else {
            rag.generated_response.clone()
        };
        let message = Message::assistant(&response);
        Ok(rag
            .into_partial()
            .with_messages(vec![message])
            .into())
    }
}
