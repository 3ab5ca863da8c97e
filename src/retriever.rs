//! Query-time retrieval: embed the query, search the index, rank chunks.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::document::ScoredChunk;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::reranker::Reranker;
use crate::vectorstore::VectorStore;

/// Retrieves the top-K chunks most similar to a query string.
///
/// Wraps an [`EmbeddingProvider`] and a [`VectorStore`]; an optional
/// [`Reranker`] runs between index search and returning results.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    reranker: Option<Arc<dyn Reranker>>,
    embed_timeout: Option<Duration>,
}

impl Retriever {
    /// Create a retriever over the given embedder and store.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store, reranker: None, embed_timeout: None }
    }

    /// Attach a reranker to run after index search.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Cap query embedding at `limit`.
    ///
    /// Elapse surfaces as a retryable
    /// [`RagError::EmbeddingError`](crate::RagError::EmbeddingError), so a
    /// provider without its own internal timeout cannot hang retrieval.
    pub fn with_embed_timeout(mut self, limit: Duration) -> Self {
        self.embed_timeout = Some(limit);
        self
    }

    /// Return the `k` chunks most similar to `query`, descending by score.
    ///
    /// An empty index yields an empty result, not an error; the caller
    /// decides how to answer without context.
    ///
    /// # Errors
    ///
    /// Propagates [`RagError::EmbeddingError`](crate::RagError::EmbeddingError)
    /// from query encoding and store/reranker failures unchanged.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if self.store.is_empty().await {
            debug!("retrieve on empty index, returning no results");
            return Ok(Vec::new());
        }

        let query_embedding = match self.embed_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.embedder.embed(query)).await {
                Ok(result) => result?,
                Err(_) => return Err(RagError::embedding_timeout(limit)),
            },
            None => self.embedder.embed(query).await?,
        };
        let results = self.store.search(&query_embedding, k).await?;

        let results = match &self.reranker {
            Some(reranker) => reranker.rerank(query, results).await?,
            None => results,
        };

        info!(k, result_count = results.len(), "retrieved chunks for query");
        Ok(results)
    }
}
