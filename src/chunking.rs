//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`SlidingWindowChunker`],
//! which splits text by character count with configurable overlap. Chunk
//! offsets are character offsets, so splitting is UTF-8 safe and the spans
//! of consecutive chunks line up exactly.

use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text, offsets, and sequence
/// indices but no embeddings; embeddings are attached by the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into ordered chunks.
    ///
    /// Returns an empty `Vec` if the document text is empty or
    /// whitespace-only.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text into fixed-size chunks with a sliding window.
///
/// The window start advances by `chunk_size - chunk_overlap` characters
/// each step, so consecutive chunks share exactly `chunk_overlap`
/// characters. The final chunk may be shorter than `chunk_size`; input no
/// longer than `chunk_size` produces exactly one chunk.
#[derive(Debug, Clone)]
pub struct SlidingWindowChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SlidingWindowChunker {
    /// Create a new `SlidingWindowChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size` (the window would never advance).
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Create a chunker from a validated [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }
}

impl Chunker for SlidingWindowChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.trim().is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, including the end of text,
        // so character windows can be sliced without splitting a code point.
        let boundaries: Vec<usize> = document
            .text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(document.text.len()))
            .collect();
        let total_chars = boundaries.len() - 1;

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total_chars {
            let end = (start + self.chunk_size).min(total_chars);
            chunks.push(Chunk {
                document_id: document.id.clone(),
                sequence_index: chunks.len(),
                start_offset: start,
                end_offset: end,
                text: document.text[boundaries[start]..boundaries[end]].to_string(),
            });
            if end == total_chars {
                break;
            }
            start += step;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("doc_1", text)
    }

    #[test]
    fn empty_and_whitespace_input_produce_no_chunks() {
        let chunker = SlidingWindowChunker::new(100, 20).unwrap();
        assert!(chunker.chunk(&doc("")).is_empty());
        assert!(chunker.chunk(&doc("   \n\t  ")).is_empty());
    }

    #[test]
    fn short_input_produces_a_single_whole_chunk() {
        let chunker = SlidingWindowChunker::new(100, 20).unwrap();
        let chunks = chunker.chunk(&doc("hello world"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!((chunks[0].start_offset, chunks[0].end_offset), (0, 11));
    }

    #[test]
    fn input_exactly_chunk_size_produces_one_chunk() {
        let chunker = SlidingWindowChunker::new(10, 2).unwrap();
        let chunks = chunker.chunk(&doc("0123456789"));
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn spans_match_the_sliding_window() {
        let text = "x".repeat(2400);
        let chunker = SlidingWindowChunker::new(1000, 200).unwrap();
        let chunks = chunker.chunk(&doc(&text));
        let spans: Vec<(usize, usize)> =
            chunks.iter().map(|c| (c.start_offset, c.end_offset)).collect();
        assert_eq!(spans, vec![(0, 1000), (800, 1800), (1600, 2400)]);
        assert_eq!(chunks[1].sequence_index, 1);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "héllo wörld ünïcode".repeat(20);
        let chunker = SlidingWindowChunker::new(50, 10).unwrap();
        let chunks = chunker.chunk(&doc(&text));
        let total: usize = text.chars().count();
        assert_eq!(chunks.last().unwrap().end_offset, total);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 50);
            assert_eq!(chunk.text.chars().count(), chunk.end_offset - chunk.start_offset);
        }
    }

    #[test]
    fn overlap_at_least_chunk_size_is_rejected() {
        assert!(SlidingWindowChunker::new(100, 100).is_err());
        assert!(SlidingWindowChunker::new(100, 150).is_err());
        assert!(SlidingWindowChunker::new(0, 0).is_err());
    }
}
