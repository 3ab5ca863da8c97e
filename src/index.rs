//! Flat vector index with JSON persistence.
//!
//! [`VectorIndex`] stores `(chunk, embedding)` pairs in insertion order
//! and searches them with a brute-force scan, like the original system's
//! flat FAISS index. The entry list lives behind a `tokio::sync::RwLock`:
//! writers (`insert`, `delete_document`) are exclusive, readers
//! (`search`, `save`) share, and no lock is held across external awaits.
//!
//! The persisted form is a single JSON file with a header recording the
//! format version, embedding dimensionality, and distance metric. The
//! header is validated before any entry is accepted on load.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::document::{Chunk, ScoredChunk};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Version tag written into the persisted index header.
const FORMAT_VERSION: u32 = 1;

/// The metric used to rank embeddings by closeness to a query.
///
/// Scores are normalized so that higher is always better and an identical
/// vector scores the metric's maximum:
///
/// - `Cosine` — cosine similarity in `[-1, 1]`; identical direction
///   scores 1.0. Zero-magnitude vectors score 0.0.
/// - `Euclidean` — `1 / (1 + distance)`; identical vectors score 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity.
    #[default]
    Cosine,
    /// Inverted Euclidean distance.
    Euclidean,
}

impl DistanceMetric {
    /// Score `candidate` against `query`; higher is more similar.
    ///
    /// Both slices must have equal length; the index guarantees this for
    /// every stored entry.
    pub fn score(&self, query: &[f32], candidate: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(query, candidate),
            Self::Euclidean => {
                let dist: f32 = query
                    .iter()
                    .zip(candidate.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + dist)
            }
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::Euclidean => write!(f, "euclidean"),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// One stored `(chunk, embedding)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// On-disk representation: header fields plus the ordered entry list.
#[derive(Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    dimension: usize,
    metric: DistanceMetric,
    entries: Vec<IndexEntry>,
}

/// A flat, append-friendly vector index with durable persistence.
///
/// The index is the retrieval core's only shared-mutable component; it is
/// safe to call concurrently from multiple tasks.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    metric: DistanceMetric,
    entries: RwLock<Vec<IndexEntry>>,
}

impl VectorIndex {
    /// Create a new empty index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `dimension` is zero.
    pub fn new(dimension: usize, metric: DistanceMetric) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::ConfigError(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self { dimension, metric, entries: RwLock::new(Vec::new()) })
    }

    /// Load a previously saved index from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexLoadError`] if the file is missing,
    /// unreadable, not valid JSON, carries an unsupported header, or
    /// contains an entry whose embedding disagrees with the header's
    /// dimensionality. A partially valid file never yields a partially
    /// initialized index.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let load_err = |message: String| RagError::IndexLoadError {
            path: path.display().to_string(),
            message,
        };

        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| load_err(format!("cannot read index file: {e}")))?;
        let file: IndexFile =
            serde_json::from_str(&raw).map_err(|e| load_err(format!("corrupt index file: {e}")))?;

        if file.version != FORMAT_VERSION {
            return Err(load_err(format!(
                "unsupported index format version {} (expected {FORMAT_VERSION})",
                file.version
            )));
        }
        if file.dimension == 0 {
            return Err(load_err("header declares zero embedding dimension".to_string()));
        }
        for (i, entry) in file.entries.iter().enumerate() {
            if entry.embedding.len() != file.dimension {
                return Err(load_err(format!(
                    "entry {i} has dimension {} but header declares {}",
                    entry.embedding.len(),
                    file.dimension
                )));
            }
        }

        info!(
            path = %path.display(),
            entries = file.entries.len(),
            dimension = file.dimension,
            metric = %file.metric,
            "loaded vector index"
        );
        Ok(Self {
            dimension: file.dimension,
            metric: file.metric,
            entries: RwLock::new(file.entries),
        })
    }

    /// Open the index at `path`, creating an empty one if no file exists.
    ///
    /// This is the explicit fresh-start opt-in: a missing file yields an
    /// empty index, but a present-and-corrupt file is still
    /// [`RagError::IndexLoadError`], as is a stored index whose
    /// dimensionality or metric disagrees with the requested ones.
    pub async fn open(
        path: impl AsRef<Path>,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "no persisted index found, starting fresh");
            return Self::new(dimension, metric);
        }

        let index = Self::load(path).await?;
        if index.dimension != dimension {
            return Err(RagError::IndexLoadError {
                path: path.display().to_string(),
                message: format!(
                    "stored index has dimension {} but {dimension} was requested",
                    index.dimension
                ),
            });
        }
        if index.metric != metric {
            return Err(RagError::IndexLoadError {
                path: path.display().to_string(),
                message: format!(
                    "stored index uses metric '{}' but '{metric}' was requested",
                    index.metric
                ),
            });
        }
        Ok(index)
    }

    /// Persist the full index to `path` as a single JSON file.
    ///
    /// Takes a read snapshot, so concurrent searches proceed and a
    /// concurrent insert either lands entirely before or entirely after
    /// the snapshot. The snapshot is written to a sibling temp file and
    /// renamed into place, so a crash mid-write never truncates an
    /// existing good file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreError`] if serialization or the write
    /// fails.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = {
            let entries = self.entries.read().await;
            let file = IndexFile {
                version: FORMAT_VERSION,
                dimension: self.dimension,
                metric: self.metric,
                entries: entries.clone(),
            };
            serde_json::to_string(&file)
                .map_err(|e| RagError::StoreError(format!("failed to serialize index: {e}")))?
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "index".to_string());
        let tmp = path.with_file_name(format!("{file_name}.tmp"));
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            RagError::StoreError(format!("failed to write index to '{}': {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| {
            RagError::StoreError(format!("failed to move index into '{}': {e}", path.display()))
        })?;
        debug!(path = %path.display(), "saved vector index");
        Ok(())
    }

    /// The distance metric this index ranks with.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }
}

#[async_trait]
impl VectorStore for VectorIndex {
    async fn insert(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::DimensionMismatch {
                expected: chunks.len(),
                actual: embeddings.len(),
            });
        }
        for embedding in embeddings {
            if embedding.len() != self.dimension {
                return Err(RagError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        let mut entries = self.entries.write().await;
        entries.reserve(chunks.len());
        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            entries.push(IndexEntry { chunk: chunk.clone(), embedding: embedding.clone() });
        }
        debug!(inserted = chunks.len(), total = entries.len(), "inserted index entries");
        Ok(())
    }

    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(RagError::ConfigError("search k must be greater than zero".to_string()));
        }
        if embedding.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let entries = self.entries.read().await;
        let mut scored: Vec<ScoredChunk> = entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: self.metric.score(embedding, &entry.embedding),
            })
            .collect();

        // Stable sort keeps insertion order for equal scores.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete_document(&self, document_id: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|entry| entry.chunk.document_id != document_id);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(document_id, removed, "deleted index entries");
        }
        Ok(())
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }
}
