//! Vector store trait for storing and searching embedded chunks.

use async_trait::async_trait;

use crate::document::{Chunk, ScoredChunk};
use crate::error::Result;

/// A storage backend for `(chunk, embedding)` pairs with similarity search.
///
/// The crate ships [`VectorIndex`](crate::VectorIndex) as the default
/// implementation; alternate backends can slot in behind this trait
/// without touching the retrieval core.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{VectorIndex, VectorStore};
///
/// let index = VectorIndex::new(768, DistanceMetric::Cosine)?;
/// index.insert(&chunks, &embeddings).await?;
/// let results = index.search(&query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append chunks with their embeddings, in input order.
    ///
    /// All-or-nothing: preconditions are checked before any entry is
    /// appended. New entries are immediately visible to `search`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`](crate::RagError::DimensionMismatch)
    /// if `chunks` and `embeddings` differ in length or any embedding's
    /// dimensionality disagrees with the store.
    async fn insert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()>;

    /// Return up to `k` entries ranked by descending similarity score.
    ///
    /// Ties are broken by insertion order (earlier entries rank higher).
    /// An empty store yields an empty result, not an error.
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Remove all entries whose chunk belongs to `document_id`.
    ///
    /// Idempotent: deleting an unknown document ID is a no-op.
    async fn delete_document(&self, document_id: &str) -> Result<()>;

    /// Number of entries currently stored.
    async fn len(&self) -> usize;

    /// Whether the store holds no entries.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The fixed dimensionality of embeddings this store accepts.
    fn dimensions(&self) -> usize;
}
