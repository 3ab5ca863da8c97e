//! Error types for the `docrag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in retrieval-core operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// A configuration validation error. Fatal: the caller must fix the
    /// configuration; never retried.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An embedding's dimensionality disagrees with the index. This is an
    /// integration error, not a transient failure.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimensionality the index was created with.
        expected: usize,
        /// The dimensionality actually supplied.
        actual: usize,
    },

    /// The upstream embedding service failed.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The upstream text-generation service failed.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A persisted index could not be loaded.
    #[error("Index load error ({path}): {message}")]
    IndexLoadError {
        /// The path that was being loaded.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// Text extraction from a source document failed.
    #[error("Extraction error ({source_name}): {message}")]
    ExtractionError {
        /// The document the extractor was processing.
        source_name: String,
        /// A description of the failure.
        message: String,
    },

    /// An error in the vector store backend.
    #[error("Vector store error: {0}")]
    StoreError(String),

    /// An error in pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RagError {
    /// Whether this error class may be retried with backoff.
    ///
    /// Only upstream-dependency failures (embedding, generation) qualify.
    /// Configuration and dimension errors require caller intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::EmbeddingError { .. } | RagError::GenerationError { .. })
    }

    /// An embedding call exceeded its configured timeout.
    ///
    /// Mapped into [`RagError::EmbeddingError`] so the retry and degrade
    /// paths treat a hang like any other upstream failure.
    pub(crate) fn embedding_timeout(limit: Duration) -> Self {
        RagError::EmbeddingError {
            provider: "upstream".to_string(),
            message: format!("no response within {limit:?}"),
        }
    }

    /// A generation call exceeded its configured timeout.
    pub(crate) fn generation_timeout(limit: Duration) -> Self {
        RagError::GenerationError {
            provider: "upstream".to_string(),
            message: format!("no response within {limit:?}"),
        }
    }
}

/// A convenience result type for retrieval-core operations.
pub type Result<T> = std::result::Result<T, RagError>;
