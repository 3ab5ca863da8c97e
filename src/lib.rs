//! Retrieval core for a document question-answering pipeline.
//!
//! `docrag` covers the path from extracted document text to a grounded
//! answer: split text into overlapping chunks, embed them, index the
//! vectors durably, retrieve the top-K chunks for a query, and hand the
//! assembled context to a generation backend. Document parsing and answer
//! generation are external collaborators behind the [`TextExtractor`],
//! [`EmbeddingProvider`], and [`AnswerSynthesizer`] traits; an Ollama
//! backend for the latter two ships in [`ollama`].
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docrag::{DistanceMetric, RagConfig, RagPipeline, VectorIndex};
//! use docrag::ollama::{OllamaEmbedder, OllamaSynthesizer};
//!
//! let config = RagConfig::default();
//! let index = Arc::new(
//!     VectorIndex::open("index.json", config.embedding_dimension, config.distance_metric)
//!         .await?,
//! );
//!
//! let pipeline = RagPipeline::builder()
//!     .config(config.clone())
//!     .embedding_provider(Arc::new(OllamaEmbedder::new(config.embed_timeout)?))
//!     .vector_store(Arc::clone(&index) as _)
//!     .synthesizer(Arc::new(OllamaSynthesizer::new(config.generation_timeout)?))
//!     .build()?;
//!
//! pipeline.ingest(&document).await?;
//! let answer = pipeline.answer("what does the incident report conclude?").await?;
//! println!("{}", answer.text);
//! index.save("index.json").await?;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extraction;
pub mod generation;
pub mod index;
pub mod ollama;
pub mod pipeline;
pub mod reranker;
pub mod retriever;
pub mod vectorstore;

pub use chunking::{Chunker, SlidingWindowChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, DocumentFormat, QueryRecord, ScoredChunk};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use extraction::TextExtractor;
pub use generation::{AnswerSynthesizer, NO_CONTEXT_ANSWER, build_context};
pub use index::{DistanceMetric, VectorIndex};
pub use pipeline::{Answer, RagPipeline, RagPipelineBuilder};
pub use reranker::{NoOpReranker, Reranker};
pub use retriever::Retriever;
pub use vectorstore::VectorStore;
