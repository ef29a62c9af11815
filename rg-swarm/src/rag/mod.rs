//! Iterative retrieval-augmented generation with bounded refinement.
//!
//! The pipeline turns one query into a validated, cited answer through
//! retrieval, grading, enrichment, reranking, generation, and
//! validation, with two rewrite feedback loops sharing a single retry
//! budget. It runs as its own graph; [`RagPipelineNode`] mounts it as an
//! agent inside the swarm.

pub mod graph;
pub mod nodes;
mod pipeline;
pub mod state;

pub use graph::build_rag_app;
pub use pipeline::RagPipelineNode;
pub use state::{
    Citation, ChunkStrategy, DEFAULT_MAX_RETRIES, EnrichedChunk, GradedChunk, QUALITY_THRESHOLD,
    QueryComplexity, QueryType, RELEVANCE_THRESHOLD, RagState, RerankedChunk, RetrievedChunk,
};
