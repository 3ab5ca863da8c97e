//! Text extraction collaborator interface.
//!
//! Document-format parsing (PDF, PPTX, DOCX) happens outside the
//! retrieval core. The [`TextExtractor`] trait is the narrow seam through
//! which the surrounding application hands raw text in: one string per
//! uploaded document, produced before `ingest` runs.

use std::path::Path;

use async_trait::async_trait;

use crate::document::DocumentFormat;
use crate::error::Result;

/// An extractor that turns an uploaded file into a single raw text string.
///
/// Failures are reported per document as
/// [`RagError::ExtractionError`](crate::RagError::ExtractionError) and
/// abort ingestion for that document only.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract the full text of the document at `path`.
    async fn extract(&self, path: &Path, format: DocumentFormat) -> Result<String>;
}
