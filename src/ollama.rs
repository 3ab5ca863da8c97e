//! Ollama-backed embedding and generation clients.
//!
//! Both clients talk to a local Ollama server over HTTP with `reqwest`.
//! [`OllamaEmbedder`] calls `/api/embeddings` (default model
//! `nomic-embed-text`), [`OllamaSynthesizer`] calls `/api/generate`
//! non-streaming (default model `llama2` at low temperature). Timeouts
//! come from the caller since these are blocking calls to an external
//! service.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::AnswerSynthesizer;

/// The default Ollama server URL.
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// The default embedding model and its dimensionality.
const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
const DEFAULT_EMBED_DIMENSIONS: usize = 768;

/// The default generation model.
const DEFAULT_GENERATE_MODEL: &str = "llama2";

fn embedding_error(message: impl Into<String>) -> RagError {
    RagError::EmbeddingError { provider: "Ollama".into(), message: message.into() }
}

fn generation_error(message: impl Into<String>) -> RagError {
    RagError::GenerationError { provider: "Ollama".into(), message: message.into() }
}

// ── Embedding ──────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by a local Ollama server.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::ollama::OllamaEmbedder;
///
/// let embedder = OllamaEmbedder::new(Duration::from_secs(30))?;
/// let embedding = embedder.embed("hello world").await?;
/// ```
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    /// Create an embedder with the default model and server URL.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if the HTTP client cannot be
    /// constructed.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| embedding_error(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: OLLAMA_BASE_URL.into(),
            model: DEFAULT_EMBED_MODEL.into(),
            dimensions: DEFAULT_EMBED_DIMENSIONS,
        })
    }

    /// Set the server base URL (e.g. `http://ollama:11434`).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the embedding model and its dimensionality.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "Ollama", model = %self.model, text_len = text.len(), "embedding text");

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&json!({ "model": self.model, "prompt": text }))
            .send()
            .await
            .map_err(|e| {
                error!(provider = "Ollama", error = %e, "embedding request failed");
                embedding_error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(provider = "Ollama", %status, "embedding API error");
            return Err(embedding_error(format!("API returned {status}: {body}")));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| embedding_error(format!("failed to parse response: {e}")))?;

        if parsed.embedding.len() != self.dimensions {
            return Err(embedding_error(format!(
                "model '{}' returned {} dimensions, expected {}",
                self.model,
                parsed.embedding.len(),
                self.dimensions
            )));
        }
        Ok(parsed.embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── Generation ─────────────────────────────────────────────────────

/// Prompt template instructing the model to answer only from context.
const ANSWER_PROMPT: &str = "You are an assistant that answers questions about documents. \
Use only the context below to answer. If the context does not contain the answer, \
say that the documents do not cover it.\n\nContext:\n{context}\n\nQuestion:\n{question}\n\nAnswer:";

/// An [`AnswerSynthesizer`] backed by a local Ollama server.
pub struct OllamaSynthesizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaSynthesizer {
    /// Create a synthesizer with the default model and server URL.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationError`] if the HTTP client cannot be
    /// constructed.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| generation_error(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: OLLAMA_BASE_URL.into(),
            model: DEFAULT_GENERATE_MODEL.into(),
            temperature: 0.1,
        })
    }

    /// Set the server base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the generation model (e.g. `smollm2`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl AnswerSynthesizer for OllamaSynthesizer {
    async fn synthesize(&self, query: &str, context: &str) -> Result<String> {
        debug!(
            provider = "Ollama",
            model = %self.model,
            context_len = context.len(),
            "generating answer"
        );

        let prompt =
            ANSWER_PROMPT.replace("{context}", context).replace("{question}", query);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: self.temperature },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "Ollama", error = %e, "generation request failed");
                generation_error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(provider = "Ollama", %status, "generation API error");
            return Err(generation_error(format!("API returned {status}: {body}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| generation_error(format!("failed to parse response: {e}")))?;

        let answer = parsed.response.trim();
        if answer.is_empty() {
            // An empty completion is an upstream failure, never a silent success.
            return Err(generation_error("model returned an empty completion".to_string()));
        }
        Ok(answer.to_string())
    }
}
