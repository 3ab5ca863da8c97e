//! End-to-end pipeline tests with deterministic mock collaborators.
//!
//! The mock embedder derives a vector from the text itself, so embedding
//! the same text twice yields the same vector: querying with a chunk's
//! exact text must surface that chunk with the metric's maximum score.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docrag::{
    AnswerSynthesizer, DistanceMetric, Document, EmbeddingProvider, NO_CONTEXT_ANSWER, RagConfig,
    RagError, RagPipeline, Result, VectorIndex, VectorStore,
};

const DIM: usize = 8;

/// Deterministic text-to-vector mapping (FNV-1a seeded per component).
fn pseudo_embedding(text: &str) -> Vec<f32> {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in text.as_bytes() {
        h ^= u64::from(*b);
        h = h.wrapping_mul(0x100000001b3);
    }
    (0..DIM)
        .map(|i| {
            let mut x = h.wrapping_add(i as u64).wrapping_mul(0x9e3779b97f4a7c15);
            x ^= x >> 33;
            ((x % 2000) as f32 / 1000.0) - 1.0
        })
        .collect()
}

/// Embedder that fails the first `failures` calls, then succeeds.
struct MockEmbedder {
    failures: AtomicUsize,
    calls: AtomicUsize,
}

impl MockEmbedder {
    fn reliable() -> Self {
        Self::flaky(0)
    }

    fn flaky(failures: usize) -> Self {
        Self { failures: AtomicUsize::new(failures), calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| f.checked_sub(1))
            .is_ok()
        {
            return Err(RagError::EmbeddingError {
                provider: "mock".into(),
                message: "temporarily unavailable".into(),
            });
        }
        if text.contains("UNEMBEDDABLE") {
            return Err(RagError::EmbeddingError {
                provider: "mock".into(),
                message: "permanent failure for this text".into(),
            });
        }
        Ok(pseudo_embedding(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Synthesizer that echoes the context length; panics if asked to work
/// without context.
struct MockSynthesizer;

#[async_trait]
impl AnswerSynthesizer for MockSynthesizer {
    async fn synthesize(&self, query: &str, context: &str) -> Result<String> {
        assert!(!context.is_empty(), "synthesizer must not be called with empty context");
        Ok(format!("answer to '{query}' from {} context chars", context.chars().count()))
    }
}

/// Embedder that never resolves, like a stuck upstream service.
struct HangingEmbedder;

#[async_trait]
impl EmbeddingProvider for HangingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        std::future::pending().await
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Synthesizer that never resolves.
struct HangingSynthesizer;

#[async_trait]
impl AnswerSynthesizer for HangingSynthesizer {
    async fn synthesize(&self, _query: &str, _context: &str) -> Result<String> {
        std::future::pending().await
    }
}

/// Synthesizer that always fails.
struct BrokenSynthesizer;

#[async_trait]
impl AnswerSynthesizer for BrokenSynthesizer {
    async fn synthesize(&self, _query: &str, _context: &str) -> Result<String> {
        Err(RagError::GenerationError { provider: "mock".into(), message: "model down".into() })
    }
}

fn pipeline_with(
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
) -> (RagPipeline, Arc<VectorIndex>) {
    let index =
        Arc::new(VectorIndex::new(config.embedding_dimension, config.distance_metric).unwrap());
    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(embedder)
        .vector_store(Arc::clone(&index) as Arc<dyn VectorStore>)
        .synthesizer(synthesizer)
        .build()
        .unwrap();
    (pipeline, index)
}

fn test_config() -> RagConfig {
    RagConfig::builder()
        .chunk_size(1000)
        .chunk_overlap(200)
        .top_k(1)
        .embedding_dimension(DIM)
        .max_retries(2)
        .build()
        .unwrap()
}

fn short_timeout_config() -> RagConfig {
    RagConfig::builder()
        .chunk_size(1000)
        .chunk_overlap(200)
        .top_k(1)
        .embedding_dimension(DIM)
        .max_retries(1)
        .embed_timeout(Duration::from_millis(100))
        .generation_timeout(Duration::from_millis(100))
        .build()
        .unwrap()
}

/// Text of 2400 distinct-ish characters so chunk embeddings differ.
fn scenario_text() -> String {
    (0..2400u32).map(|i| char::from(b'a' + (i % 26) as u8 + u8::from(i % 7 == 0))).collect()
}

#[tokio::test]
async fn scenario_three_chunks_and_exact_match_retrieval() {
    let (pipeline, index) = pipeline_with(
        test_config(),
        Arc::new(MockEmbedder::reliable()),
        Arc::new(MockSynthesizer),
    );

    let text = scenario_text();
    let count = pipeline.ingest(&Document::new("D1", &text)).await.unwrap();
    assert_eq!(count, 3);

    // Query with a vector identical to chunk 2's embedding.
    let chunk2_text: String = text.chars().skip(800).take(1000).collect();
    let results = index.search(&pseudo_embedding(&chunk2_text), 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.sequence_index, 1);
    assert_eq!((results[0].chunk.start_offset, results[0].chunk.end_offset), (800, 1800));
    assert!((results[0].score - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn answer_returns_text_with_sources_and_records_history() {
    let (pipeline, _) = pipeline_with(
        test_config(),
        Arc::new(MockEmbedder::reliable()),
        Arc::new(MockSynthesizer),
    );
    let text = scenario_text();
    pipeline.ingest(&Document::new("D1", &text)).await.unwrap();

    let chunk2_text: String = text.chars().skip(800).take(1000).collect();
    let answer = pipeline.answer(&chunk2_text).await.unwrap();

    assert!(answer.text.starts_with("answer to"));
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].chunk.sequence_index, 1);

    let history = pipeline.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].query, chunk2_text);
    assert_eq!(history[0].answer, answer.text);
    assert_eq!(history[0].sources.len(), 1);
}

#[tokio::test]
async fn answer_on_empty_index_returns_canned_fallback() {
    let (pipeline, _) = pipeline_with(
        test_config(),
        Arc::new(MockEmbedder::reliable()),
        Arc::new(MockSynthesizer), // panics if ever invoked with empty context
    );

    let answer = pipeline.answer("anything at all").await.unwrap();
    assert_eq!(answer.text, NO_CONTEXT_ANSWER);
    assert!(answer.sources.is_empty());
    assert_eq!(pipeline.history().await.len(), 1);
}

#[tokio::test]
async fn empty_document_ingests_zero_chunks() {
    let (pipeline, index) = pipeline_with(
        test_config(),
        Arc::new(MockEmbedder::reliable()),
        Arc::new(MockSynthesizer),
    );
    let count = pipeline.ingest(&Document::new("empty", "   \n  ")).await.unwrap();
    assert_eq!(count, 0);
    assert_eq!(index.len().await, 0);
}

#[tokio::test]
async fn flaky_embedder_is_retried_until_it_succeeds() {
    let embedder = Arc::new(MockEmbedder::flaky(2));
    let (pipeline, index) =
        pipeline_with(test_config(), Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>, Arc::new(MockSynthesizer));

    // Two failures then success fits within max_retries = 2.
    let count = pipeline.ingest(&Document::new("D1", &scenario_text())).await.unwrap();
    assert_eq!(count, 3);
    assert_eq!(index.len().await, 3);
}

#[tokio::test]
async fn exhausted_embedding_retries_fail_ingest_and_leave_index_clean() {
    let embedder = Arc::new(MockEmbedder::flaky(usize::MAX));
    let (pipeline, index) =
        pipeline_with(test_config(), Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>, Arc::new(MockSynthesizer));

    let err = pipeline.ingest(&Document::new("D1", &scenario_text())).await.unwrap_err();
    assert!(matches!(err, RagError::PipelineError(_)));
    assert_eq!(index.len().await, 0);
    // Initial attempt plus max_retries = 2.
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retrieval_failure_degrades_to_fallback_answer() {
    let (pipeline, index) = pipeline_with(
        test_config(),
        Arc::new(MockEmbedder::reliable()),
        Arc::new(MockSynthesizer),
    );
    pipeline.ingest(&Document::new("D1", &scenario_text())).await.unwrap();
    assert_eq!(index.len().await, 3);

    // The query itself cannot be embedded; after retries the pipeline
    // must degrade instead of surfacing the raw upstream error.
    let answer = pipeline.answer("UNEMBEDDABLE question").await.unwrap();
    assert_eq!(answer.text, NO_CONTEXT_ANSWER);
    assert!(answer.sources.is_empty());
}

#[tokio::test]
async fn answer_with_k_overrides_the_configured_breadth() {
    // top_k stays at 1; the caller widens retrieval per query.
    let (pipeline, _) = pipeline_with(
        test_config(),
        Arc::new(MockEmbedder::reliable()),
        Arc::new(MockSynthesizer),
    );
    let text = scenario_text();
    pipeline.ingest(&Document::new("D1", &text)).await.unwrap();

    let chunk2_text: String = text.chars().skip(800).take(1000).collect();
    let narrow = pipeline.answer(&chunk2_text).await.unwrap();
    assert_eq!(narrow.sources.len(), 1);

    let wide = pipeline.answer_with_k(&chunk2_text, 3).await.unwrap();
    assert_eq!(wide.sources.len(), 3);
    assert_eq!(wide.sources[0].chunk.sequence_index, 1);

    let err = pipeline.answer_with_k(&chunk2_text, 0).await.unwrap_err();
    assert!(matches!(err, RagError::ConfigError(_)));
}

#[tokio::test(start_paused = true)]
async fn hanging_embedder_times_out_during_ingest() {
    let (pipeline, index) = pipeline_with(
        short_timeout_config(),
        Arc::new(HangingEmbedder),
        Arc::new(MockSynthesizer),
    );

    let err = pipeline.ingest(&Document::new("D1", &scenario_text())).await.unwrap_err();
    assert!(matches!(err, RagError::PipelineError(_)));
    assert_eq!(index.len().await, 0);
}

#[tokio::test(start_paused = true)]
async fn hanging_query_embedding_times_out_and_degrades_to_fallback() {
    let (pipeline, index) = pipeline_with(
        short_timeout_config(),
        Arc::new(HangingEmbedder),
        Arc::new(MockSynthesizer),
    );
    // Populate the index directly; only query embedding should hang.
    let chunk = docrag::Chunk {
        document_id: "D1".to_string(),
        sequence_index: 0,
        start_offset: 0,
        end_offset: 4,
        text: "body".to_string(),
    };
    index.insert(&[chunk], &[pseudo_embedding("body")]).await.unwrap();

    let answer = pipeline.answer("anything").await.unwrap();
    assert_eq!(answer.text, NO_CONTEXT_ANSWER);
    assert!(answer.sources.is_empty());
}

#[tokio::test(start_paused = true)]
async fn hanging_synthesizer_times_out_with_a_wrapped_error() {
    let (pipeline, _) = pipeline_with(
        short_timeout_config(),
        Arc::new(MockEmbedder::reliable()),
        Arc::new(HangingSynthesizer),
    );
    pipeline.ingest(&Document::new("D1", &scenario_text())).await.unwrap();

    let err = pipeline.answer("what happened?").await.unwrap_err();
    match err {
        RagError::PipelineError(message) => {
            assert!(message.contains("failed to generate an answer"));
        }
        other => panic!("expected PipelineError, got {other:?}"),
    }
}

#[tokio::test]
async fn generation_failure_surfaces_a_wrapped_error() {
    let (pipeline, _) = pipeline_with(
        test_config(),
        Arc::new(MockEmbedder::reliable()),
        Arc::new(BrokenSynthesizer),
    );
    pipeline.ingest(&Document::new("D1", &scenario_text())).await.unwrap();

    let err = pipeline.answer("what happened?").await.unwrap_err();
    match err {
        RagError::PipelineError(message) => {
            assert!(message.contains("failed to generate an answer"));
        }
        other => panic!("expected PipelineError, got {other:?}"),
    }
}

#[tokio::test]
async fn batch_ingest_isolates_failures_per_document() {
    let (pipeline, index) = pipeline_with(
        test_config(),
        Arc::new(MockEmbedder::reliable()),
        Arc::new(MockSynthesizer),
    );

    let documents = vec![
        Document::new("good_1", "first document body"),
        Document::new("bad", "UNEMBEDDABLE body"),
        Document::new("good_2", "second document body"),
    ];
    let results = pipeline.ingest_batch(&documents).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].1.as_ref().unwrap(), &1);
    assert!(results[1].1.is_err());
    assert_eq!(results[2].1.as_ref().unwrap(), &1);
    // Only the two good documents are indexed.
    assert_eq!(index.len().await, 2);
}

#[tokio::test]
async fn delete_document_through_pipeline_is_idempotent() {
    let (pipeline, index) = pipeline_with(
        test_config(),
        Arc::new(MockEmbedder::reliable()),
        Arc::new(MockSynthesizer),
    );
    pipeline.ingest(&Document::new("D1", &scenario_text())).await.unwrap();
    pipeline.ingest(&Document::new("D2", "some other material")).await.unwrap();

    pipeline.delete_document("D1").await.unwrap();
    pipeline.delete_document("D1").await.unwrap();
    assert_eq!(index.len().await, 1);
}

#[tokio::test]
async fn builder_rejects_embedder_store_dimension_disagreement() {
    let index = Arc::new(VectorIndex::new(DIM + 1, DistanceMetric::Cosine).unwrap());
    let err = RagPipeline::builder()
        .config(test_config())
        .embedding_provider(Arc::new(MockEmbedder::reliable()))
        .vector_store(index as Arc<dyn VectorStore>)
        .synthesizer(Arc::new(MockSynthesizer))
        .build()
        .unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { .. }));
}

#[tokio::test]
async fn builder_rejects_missing_required_fields() {
    let err = RagPipeline::builder().config(test_config()).build().unwrap_err();
    assert!(matches!(err, RagError::ConfigError(_)));
}
