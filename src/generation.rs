//! Answer synthesis trait and context assembly.
//!
//! The [`AnswerSynthesizer`] is the external text-generation collaborator:
//! given a query and a context string built from retrieved chunks, it
//! produces a grounded natural-language answer. [`build_context`] turns a
//! ranked retrieval result into that context string, truncating
//! lowest-ranked chunks first and never splitting a chunk.

use async_trait::async_trait;

use crate::document::ScoredChunk;
use crate::error::Result;

/// The canned answer returned when retrieval finds no relevant context.
///
/// Matches the degraded-response policy: an empty index or an empty
/// retrieval result must never reach the generation backend.
pub const NO_CONTEXT_ANSWER: &str =
    "No relevant information found in the indexed documents for this question.";

/// A generator that synthesizes a grounded answer from retrieved context.
///
/// Implementations must fail with
/// [`RagError::GenerationError`](crate::RagError::GenerationError) on
/// upstream failure rather than returning an empty string.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    /// Produce an answer to `query` using only the supplied `context`.
    async fn synthesize(&self, query: &str, context: &str) -> Result<String>;
}

/// Assemble retrieved chunks into a single context string.
///
/// Chunk texts are concatenated in rank order, separated by blank lines.
/// If adding a chunk would push the context past `max_chars`, that chunk
/// and everything ranked below it are dropped whole. The top-ranked chunk
/// is always included, even when it alone exceeds `max_chars`, so the
/// synthesizer never receives an empty context for a non-empty result.
pub fn build_context(results: &[ScoredChunk], max_chars: usize) -> String {
    let mut context = String::new();
    for result in results {
        let text = result.chunk.text.as_str();
        let added = if context.is_empty() { text.chars().count() } else { text.chars().count() + 2 };
        if !context.is_empty() && context.chars().count() + added > max_chars {
            break;
        }
        if !context.is_empty() {
            context.push_str("\n\n");
        }
        context.push_str(text);
    }
    context
}
