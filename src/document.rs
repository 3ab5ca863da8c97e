//! Data types for documents, chunks, and retrieval results.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A source document: an opaque identifier plus the raw text produced by
/// extraction. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The extracted text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with no metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: HashMap::new() }
    }
}

/// A contiguous segment of a [`Document`]'s text.
///
/// Offsets are **character** offsets into the source text, so
/// `end_offset - start_offset` always equals `text.chars().count()`.
/// Chunks are immutable once produced by a chunker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Position of this chunk among its siblings, starting at 0.
    pub sequence_index: usize,
    /// Character offset of the chunk's first character in the source text.
    pub start_offset: usize,
    /// Character offset one past the chunk's last character.
    pub end_offset: usize,
    /// The text content of the chunk.
    pub text: String,
}

/// A retrieved [`Chunk`] paired with a similarity score.
///
/// Higher scores are more relevant; results are ordered by descending
/// score with ties broken by insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// One completed question-answer exchange, recorded by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    /// The user's query text.
    pub query: String,
    /// The chunks the answer was grounded in.
    pub sources: Vec<ScoredChunk>,
    /// The synthesized answer text.
    pub answer: String,
    /// When the exchange completed.
    pub timestamp: DateTime<Utc>,
}

/// Source document formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Portable Document Format.
    Pdf,
    /// PowerPoint presentation.
    Pptx,
    /// Word document.
    Docx,
}

impl DocumentFormat {
    /// Map a file extension (case-insensitive) to a format.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ExtractionError`] for unsupported extensions.
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "pptx" => Ok(Self::Pptx),
            "docx" => Ok(Self::Docx),
            other => Err(RagError::ExtractionError {
                source_name: format!("*.{other}"),
                message: format!("unsupported file type '{other}' (expected pdf, pptx, or docx)"),
            }),
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Pptx => write!(f, "pptx"),
            Self::Docx => write!(f, "docx"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mapping_is_case_insensitive() {
        assert_eq!(DocumentFormat::from_extension("PDF").unwrap(), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_extension("pptx").unwrap(), DocumentFormat::Pptx);
        assert_eq!(DocumentFormat::from_extension("Docx").unwrap(), DocumentFormat::Docx);
    }

    #[test]
    fn unknown_extension_is_an_extraction_error() {
        let err = DocumentFormat::from_extension("xlsx").unwrap_err();
        assert!(matches!(err, RagError::ExtractionError { .. }));
    }
}
