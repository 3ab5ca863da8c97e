//! Property tests for sliding-window chunking invariants.

use docrag::chunking::{Chunker, SlidingWindowChunker};
use docrag::document::Document;
use proptest::prelude::*;

/// Generate text (mixed ASCII and multibyte) containing at least one
/// non-whitespace character, paired with a valid size/overlap pair.
fn arb_chunking_case() -> impl Strategy<Value = (String, usize, usize)> {
    let text = "[a-z é漢 ]{1,600}"
        .prop_filter("needs a non-whitespace char", |t: &String| !t.trim().is_empty());
    (text, 2usize..80).prop_flat_map(|(text, chunk_size)| {
        (Just(text), Just(chunk_size), 0..chunk_size)
    })
}

/// **Chunk coverage**: concatenating each chunk's unique (non-overlapping)
/// span in sequence order reconstructs the input text exactly.
mod prop_chunk_coverage {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn unique_spans_reconstruct_the_input((text, chunk_size, overlap) in arb_chunking_case()) {
            let chunker = SlidingWindowChunker::new(chunk_size, overlap).unwrap();
            let chunks = chunker.chunk(&Document::new("doc", &text));
            prop_assert!(!chunks.is_empty());

            let mut reconstructed = String::new();
            let mut covered = 0;
            for chunk in &chunks {
                prop_assert!(chunk.start_offset <= covered, "gap before chunk {}", chunk.sequence_index);
                let skip = covered - chunk.start_offset;
                reconstructed.extend(chunk.text.chars().skip(skip));
                covered = chunk.end_offset;
            }
            prop_assert_eq!(reconstructed, text);
        }
    }
}

/// **Chunk size bound** and **overlap exactness**: every chunk fits within
/// `chunk_size` characters, and consecutive chunks share exactly
/// `chunk_overlap` characters of span.
mod prop_size_and_overlap {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_are_bounded_and_overlap_exactly((text, chunk_size, overlap) in arb_chunking_case()) {
            let chunker = SlidingWindowChunker::new(chunk_size, overlap).unwrap();
            let chunks = chunker.chunk(&Document::new("doc", &text));

            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.sequence_index, i);
                let span = chunk.end_offset - chunk.start_offset;
                prop_assert!(span <= chunk_size);
                prop_assert_eq!(chunk.text.chars().count(), span);
            }

            for pair in chunks.windows(2) {
                let shared = pair[0].end_offset - pair[1].start_offset;
                prop_assert_eq!(shared, overlap, "chunks {} and {}", pair[0].sequence_index, pair[1].sequence_index);
            }

            // A single chunk means the text fit entirely in the window.
            if chunks.len() == 1 {
                prop_assert!(text.chars().count() <= chunk_size);
            }
        }
    }
}
