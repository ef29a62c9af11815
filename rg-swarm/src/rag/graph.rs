//! Refinement pipeline wiring.
//!
//! ```text
//! Start -> setup -> query_analysis
//!   query_analysis -+-> handoff_exit -> End            (out-of-domain)
//!                   +-> chunk_strategy -> ingestion -> retrieval
//!                   +-> retrieval                      (no ingestion)
//! retrieval -> relevance_grading
//!   relevance_grading -+-> query_rewrite -> retrieval  (avg < 0.6)
//!                      +-> context_enrichment
//! context_enrichment -> reranking -> response_generation -> quality_validation
//!   quality_validation -+-> prepare_exit -> End        (score > 0.7, or budget spent)
//!                       +-> query_rewrite -> retrieval
//! ```
//!
//! Both rewrite edges consume the same `retry_count` budget; the nodes
//! force `needs_rewrite` off at the cap and the quality edge checks the
//! budget itself, so the two loops cannot oscillate past it.

use std::sync::Arc;

use relaygraph::app::App;
use relaygraph::graphs::{EdgePredicate, GraphBuilder, GraphCompileError};
use relaygraph::types::NodeKind;

use crate::infer::StructuredInfer;

use super::nodes::{
    ChunkStrategyNode, ContextEnrichmentNode, HandoffExitNode, IngestionNode, PrepareExitNode,
    QualityValidationNode, QueryAnalysisNode, QueryRewriteNode, RelevanceGradingNode,
    RerankingNode, ResponseGenerationNode, RetrievalNode, SetupNode,
};
use super::state::{QUALITY_THRESHOLD, RagState};

pub const SETUP: &str = "setup";
pub const QUERY_ANALYSIS: &str = "query_analysis";
pub const HANDOFF_EXIT: &str = "handoff_exit";
pub const CHUNK_STRATEGY: &str = "chunk_strategy";
pub const INGESTION: &str = "ingestion";
pub const RETRIEVAL: &str = "retrieval";
pub const RELEVANCE_GRADING: &str = "relevance_grading";
pub const QUERY_REWRITE: &str = "query_rewrite";
pub const CONTEXT_ENRICHMENT: &str = "context_enrichment";
pub const RERANKING: &str = "reranking";
pub const RESPONSE_GENERATION: &str = "response_generation";
pub const QUALITY_VALIDATION: &str = "quality_validation";
pub const PREPARE_EXIT: &str = "prepare_exit";

fn custom(name: &str) -> NodeKind {
    NodeKind::Custom(name.to_string())
}

/// Compile the refinement pipeline as a standalone graph.
pub fn build_rag_app(infer: Arc<dyn StructuredInfer>) -> Result<App, GraphCompileError> {
    let analysis_route: EdgePredicate = Arc::new(|snapshot| {
        let rag = RagState::peek(&snapshot);
        if rag.handoff_to_agent.is_some() {
            vec![HANDOFF_EXIT.to_string()]
        } else if rag.ingestion_required {
            vec![CHUNK_STRATEGY.to_string()]
        } else {
            vec![RETRIEVAL.to_string()]
        }
    });

    let grading_route: EdgePredicate = Arc::new(|snapshot| {
        let rag = RagState::peek(&snapshot);
        if rag.needs_rewrite {
            vec![QUERY_REWRITE.to_string()]
        } else {
            vec![CONTEXT_ENRICHMENT.to_string()]
        }
    });

    let quality_route: EdgePredicate = Arc::new(|snapshot| {
        let rag = RagState::peek(&snapshot);
        if rag.quality_score > QUALITY_THRESHOLD {
            vec![PREPARE_EXIT.to_string()]
        } else if rag.retry_count < rag.max_retries {
            vec![QUERY_REWRITE.to_string()]
        } else {
            // Budget spent: forced termination.
            vec![PREPARE_EXIT.to_string()]
        }
    });

    GraphBuilder::new()
        .add_node(custom(SETUP), SetupNode { infer: infer.clone() })
        .add_node(
            custom(QUERY_ANALYSIS),
            QueryAnalysisNode { infer: infer.clone() },
        )
        .add_node(custom(HANDOFF_EXIT), HandoffExitNode)
        .add_node(
            custom(CHUNK_STRATEGY),
            ChunkStrategyNode { infer: infer.clone() },
        )
        .add_node(custom(INGESTION), IngestionNode)
        .add_node(custom(RETRIEVAL), RetrievalNode { infer: infer.clone() })
        .add_node(
            custom(RELEVANCE_GRADING),
            RelevanceGradingNode { infer: infer.clone() },
        )
        .add_node(
            custom(QUERY_REWRITE),
            QueryRewriteNode { infer: infer.clone() },
        )
        .add_node(
            custom(CONTEXT_ENRICHMENT),
            ContextEnrichmentNode { infer: infer.clone() },
        )
        .add_node(custom(RERANKING), RerankingNode { infer: infer.clone() })
        .add_node(
            custom(RESPONSE_GENERATION),
            ResponseGenerationNode { infer: infer.clone() },
        )
        .add_node(
            custom(QUALITY_VALIDATION),
            QualityValidationNode { infer },
        )
        .add_node(custom(PREPARE_EXIT), PrepareExitNode)
        .add_edge(NodeKind::Start, custom(SETUP))
        .add_edge(custom(SETUP), custom(QUERY_ANALYSIS))
        .add_conditional_edge(custom(QUERY_ANALYSIS), analysis_route)
        .add_edge(custom(CHUNK_STRATEGY), custom(INGESTION))
        .add_edge(custom(INGESTION), custom(RETRIEVAL))
        .add_edge(custom(RETRIEVAL), custom(RELEVANCE_GRADING))
        .add_conditional_edge(custom(RELEVANCE_GRADING), grading_route)
        .add_edge(custom(QUERY_REWRITE), custom(RETRIEVAL))
        .add_edge(custom(CONTEXT_ENRICHMENT), custom(RERANKING))
        .add_edge(custom(RERANKING), custom(RESPONSE_GENERATION))
        .add_edge(custom(RESPONSE_GENERATION), custom(QUALITY_VALIDATION))
        .add_conditional_edge(custom(QUALITY_VALIDATION), quality_route)
        .add_edge(custom(HANDOFF_EXIT), NodeKind::End)
        .add_edge(custom(PREPARE_EXIT), NodeKind::End)
        .compile()
}
