//! Reranker trait for re-scoring retrieval results.

use async_trait::async_trait;

use crate::document::ScoredChunk;
use crate::error::Result;

/// A reranker that re-scores and reorders retrieval results.
///
/// The retriever applies a configured reranker between index search and
/// returning results, so a cross-encoder or LLM-based stage can be added
/// without touching the retrieval core.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank results given the original query.
    ///
    /// Returns results in a new order with potentially updated scores.
    async fn rerank(&self, query: &str, results: Vec<ScoredChunk>) -> Result<Vec<ScoredChunk>>;
}

/// A no-op reranker that returns results unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReranker;

#[async_trait]
impl Reranker for NoOpReranker {
    async fn rerank(&self, _query: &str, results: Vec<ScoredChunk>) -> Result<Vec<ScoredChunk>> {
        Ok(results)
    }
}
