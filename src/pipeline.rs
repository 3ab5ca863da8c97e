//! Pipeline orchestrator.
//!
//! [`RagPipeline`] composes the retrieval core end to end: ingest runs
//! chunk → embed → insert with per-document rollback, answer runs
//! retrieve → synthesize with a canned fallback when no context is found.
//! Upstream embedding and generation failures are retried with bounded
//! exponential backoff; configuration and dimension errors are not.
//! Collaborator calls are capped at the configured timeouts, with elapse
//! treated as an upstream failure.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docrag::{RagPipeline, RagConfig, VectorIndex, DistanceMetric};
//!
//! let config = RagConfig::default();
//! let index = Arc::new(VectorIndex::new(config.embedding_dimension, config.distance_metric)?);
//! let pipeline = RagPipeline::builder()
//!     .config(config)
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_store(index)
//!     .synthesizer(Arc::new(synthesizer))
//!     .build()?;
//!
//! let count = pipeline.ingest(&document).await?;
//! let answer = pipeline.answer("what does the report conclude?").await?;
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::chunking::{Chunker, SlidingWindowChunker};
use crate::config::RagConfig;
use crate::document::{Document, DocumentFormat, QueryRecord, ScoredChunk};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extraction::TextExtractor;
use crate::generation::{AnswerSynthesizer, NO_CONTEXT_ANSWER, build_context};
use crate::reranker::Reranker;
use crate::retriever::Retriever;
use crate::vectorstore::VectorStore;

/// First backoff delay; doubles on each subsequent retry.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// A synthesized answer together with the chunks it was grounded in.
#[derive(Debug, Clone)]
pub struct Answer {
    /// The answer text.
    pub text: String,
    /// The supporting chunks, descending by score, for provenance.
    pub sources: Vec<ScoredChunk>,
}

/// Retry `op` with exponential backoff on retryable errors.
///
/// Only [`RagError::is_retryable`] failures are retried, at most
/// `max_retries` times after the initial attempt.
async fn with_retry<T, F, Fut>(max_retries: usize, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                let delay = RETRY_BASE_DELAY * (1 << (attempt - 1));
                warn!(what, attempt, error = %e, "retryable failure, backing off");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Cap an external-collaborator call at `limit`.
///
/// Elapse is mapped through `on_elapse` into the caller's error domain so
/// the retry and degrade paths engage the same way as any other upstream
/// failure.
async fn timed<T, Fut>(limit: Duration, fut: Fut, on_elapse: fn(Duration) -> RagError) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_elapse(limit)),
    }
}

/// The pipeline orchestrator.
///
/// Holds the injected embedder, vector store, chunker, and synthesizer,
/// plus an in-memory conversation log. `ingest` and `answer` are safe to
/// call concurrently; the vector store is the only shared-mutable state
/// and its lock is never held while waiting on an external service.
pub struct RagPipeline {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    retriever: Retriever,
    history: Mutex<Vec<QueryRecord>>,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Ingest a document: chunk → embed → insert.
    ///
    /// Atomic from the caller's perspective: either every chunk of the
    /// document is indexed or none is. Chunk order is preserved from
    /// chunker output through embedding to insertion. Returns the number
    /// of chunks indexed; empty text indexes nothing and returns 0.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] naming the document if
    /// embedding (after retries) or insertion fails. On insertion failure
    /// the document's entries are rolled back via
    /// [`VectorStore::delete_document`].
    pub async fn ingest(&self, document: &Document) -> Result<usize> {
        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            info!(document.id = %document.id, chunk_count = 0, "ingested document (empty)");
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = with_retry(self.config.max_retries, "embedding", || {
            timed(
                self.config.embed_timeout,
                self.embedder.embed_batch(&texts),
                RagError::embedding_timeout,
            )
        })
        .await
        .map_err(|e| {
            error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
            RagError::PipelineError(format!("embedding failed for document '{}': {e}", document.id))
        })?;

        if let Err(e) = self.store.insert(&chunks, &embeddings).await {
            // Remove anything the store may have applied for this document.
            if let Err(rollback) = self.store.delete_document(&document.id).await {
                warn!(document.id = %document.id, error = %rollback, "rollback after failed insert also failed");
            }
            error!(document.id = %document.id, error = %e, "insert failed during ingestion");
            return Err(RagError::PipelineError(format!(
                "indexing failed for document '{}': {e}",
                document.id
            )));
        }

        info!(document.id = %document.id, chunk_count = chunks.len(), "ingested document");
        Ok(chunks.len())
    }

    /// Ingest multiple documents, isolating failures per document.
    ///
    /// One document's failure never aborts its siblings. Returns each
    /// document's ID with its chunk count or error, in input order.
    pub async fn ingest_batch(&self, documents: &[Document]) -> Vec<(String, Result<usize>)> {
        let mut results = Vec::with_capacity(documents.len());
        for document in documents {
            let outcome = self.ingest(document).await;
            if let Err(e) = &outcome {
                warn!(document.id = %document.id, error = %e, "document failed in batch, continuing");
            }
            results.push((document.id.clone(), outcome));
        }
        results
    }

    /// Extract a file's text and ingest it as `document_id`.
    ///
    /// The format is derived from the file extension (`pdf`, `pptx`,
    /// `docx`).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ExtractionError`] for unsupported or missing
    /// extensions and extractor failures, before any of the retrieval
    /// core runs; otherwise as [`ingest`](Self::ingest).
    pub async fn ingest_path(
        &self,
        extractor: &dyn TextExtractor,
        document_id: &str,
        path: &Path,
    ) -> Result<usize> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            RagError::ExtractionError {
                source_name: path.display().to_string(),
                message: "file has no extension".to_string(),
            }
        })?;
        let format = DocumentFormat::from_extension(ext)?;
        let text = extractor.extract(path, format).await?;
        self.ingest(&Document::new(document_id, text)).await
    }

    /// Answer a query using the configured default `top_k`.
    ///
    /// Convenience for [`answer_with_k`](Self::answer_with_k).
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        self.answer_with_k(query, self.config.top_k).await
    }

    /// Answer a query from the indexed documents, retrieving `k` chunks.
    ///
    /// Builds a context capped at `max_context_chars` from the retrieved
    /// chunks (dropping lowest-ranked chunks whole) and synthesizes an
    /// answer grounded in it. When retrieval finds nothing — empty index
    /// or exhausted embedding retries — the canned fallback answer is
    /// returned instead of calling the synthesizer. Every completed query
    /// is appended to the conversation log.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] when `k` is zero, and
    /// [`RagError::PipelineError`] with a human-readable message if
    /// generation fails after retries. Generation never silently yields
    /// an empty answer.
    pub async fn answer_with_k(&self, query: &str, k: usize) -> Result<Answer> {
        if k == 0 {
            return Err(RagError::ConfigError("answer k must be greater than zero".to_string()));
        }

        let retrieval = with_retry(self.config.max_retries, "retrieval", || {
            self.retriever.retrieve(query, k)
        })
        .await;

        let sources = match retrieval {
            Ok(sources) => sources,
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "retrieval failed after retries, degrading to fallback answer");
                return Ok(self.record(query, Vec::new(), NO_CONTEXT_ANSWER.to_string()).await);
            }
            Err(e) => return Err(e),
        };

        if sources.is_empty() {
            info!("no relevant chunks found, returning fallback answer");
            return Ok(self.record(query, sources, NO_CONTEXT_ANSWER.to_string()).await);
        }

        let context = build_context(&sources, self.config.max_context_chars);
        let text = with_retry(self.config.max_retries, "generation", || {
            timed(
                self.config.generation_timeout,
                self.synthesizer.synthesize(query, &context),
                RagError::generation_timeout,
            )
        })
        .await
        .map_err(|e| {
            error!(error = %e, "answer generation failed");
            RagError::PipelineError(format!("failed to generate an answer: {e}"))
        })?;

        info!(source_count = sources.len(), "answered query");
        Ok(self.record(query, sources, text).await)
    }

    /// Remove all indexed entries for `document_id`. Idempotent.
    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        self.store.delete_document(document_id).await?;
        info!(document_id, "deleted document from index");
        Ok(())
    }

    /// Snapshot of the conversation log, oldest first.
    pub async fn history(&self) -> Vec<QueryRecord> {
        self.history.lock().await.clone()
    }

    /// Append a query record and package the answer for the caller.
    async fn record(&self, query: &str, sources: Vec<ScoredChunk>, answer: String) -> Answer {
        let record = QueryRecord {
            query: query.to_string(),
            sources: sources.clone(),
            answer: answer.clone(),
            timestamp: Utc::now(),
        };
        self.history.lock().await.push(record);
        Answer { text: answer, sources }
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider`, `vector_store`, and `synthesizer` are
/// required; the chunker defaults to a [`SlidingWindowChunker`] built
/// from the config, and the reranker is optional.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    synthesizer: Option<Arc<dyn AnswerSynthesizer>>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the document chunker. Defaults to [`SlidingWindowChunker`].
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the answer synthesizer.
    pub fn synthesizer(mut self, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Set an optional reranker to run between search and return.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Build the [`RagPipeline`], validating that required fields are set
    /// and that the embedder's dimensionality matches the store's.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] on a missing required field, and
    /// [`RagError::DimensionMismatch`] when the embedding provider and
    /// vector store disagree on dimensionality.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let synthesizer = self
            .synthesizer
            .ok_or_else(|| RagError::ConfigError("synthesizer is required".to_string()))?;

        if embedder.dimensions() != store.dimensions() {
            return Err(RagError::DimensionMismatch {
                expected: store.dimensions(),
                actual: embedder.dimensions(),
            });
        }

        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(SlidingWindowChunker::from_config(&config)?),
        };

        let mut retriever = Retriever::new(Arc::clone(&embedder), Arc::clone(&store))
            .with_embed_timeout(config.embed_timeout);
        if let Some(reranker) = self.reranker {
            retriever = retriever.with_reranker(reranker);
        }

        Ok(RagPipeline {
            config,
            embedder,
            store,
            chunker,
            synthesizer,
            retriever,
            history: Mutex::new(Vec::new()),
        })
    }
}
