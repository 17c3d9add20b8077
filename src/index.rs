//! Generation-tagged vector index: build, merge, persist, swap.
//!
//! [`VectorIndex`] owns one entry per chunk id, keyed in a `BTreeMap` so
//! index contents are identical regardless of embedding completion order.
//! [`IndexBuilder`] embeds chunks with bounded concurrent fan-out; a failed
//! embedding excludes that one chunk and never aborts the build.
//!
//! Rebuilds are atomic from a reader's point of view: each build writes a
//! fresh `index-<generation>.json`, then the `CURRENT` pointer file is
//! replaced with a rename. [`IndexHandle`] is the in-process equivalent —
//! queries hold an `Arc` snapshot, and a swap is one pointer update.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::{PipelineError, Result};
use crate::models::{Chunk, ScoredChunk};

const CURRENT_POINTER: &str = "CURRENT";

/// One indexed chunk with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    /// Version tag distinguishing successive full rebuilds.
    pub generation: String,
    /// Embedding model that produced every vector in this index.
    pub model: String,
    pub dims: usize,
    /// Entries keyed by chunk id; re-indexing the same id replaces.
    pub entries: BTreeMap<String, IndexEntry>,
}

impl VectorIndex {
    pub fn empty(generation: String, model: String, dims: usize) -> Self {
        Self {
            generation,
            model,
            dims,
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Brute-force nearest-neighbor lookup: every entry scored by cosine
    /// similarity, descending, ties broken by source priority then chunk id.
    pub fn search(&self, query: &[f32], limit: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .values()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query, &entry.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk.metadata.source.priority().cmp(&b.chunk.metadata.source.priority()))
                .then(a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(limit);
        scored
    }

    /// Serialize this generation and swap the `CURRENT` pointer onto it.
    /// Both writes go to a temp file first and land with a rename, so a
    /// crashed build never leaves a partially-written generation visible.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let index_path = dir.join(format!("index-{}.json", self.generation));
        let tmp_path = dir.join(format!(".index-{}.json.tmp", self.generation));
        let json = serde_json::to_vec(self)?;
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &index_path)?;

        let ptr_tmp = dir.join(".CURRENT.tmp");
        std::fs::write(&ptr_tmp, &self.generation)?;
        std::fs::rename(&ptr_tmp, dir.join(CURRENT_POINTER))?;

        info!(
            generation = %self.generation,
            entries = self.len(),
            dir = %dir.display(),
            "index generation persisted"
        );
        Ok(())
    }

    /// Restore the generation named by the `CURRENT` pointer.
    pub fn load(dir: &Path) -> Result<Self> {
        let generation = std::fs::read_to_string(dir.join(CURRENT_POINTER))
            .map_err(|_| {
                PipelineError::InvalidArgument(format!(
                    "no index found in {} — run `lunfardo ingest` first",
                    dir.display()
                ))
            })?
            .trim()
            .to_string();

        let index_path = dir.join(format!("index-{}.json", generation));
        let bytes = std::fs::read(&index_path)?;
        let index: VectorIndex = serde_json::from_slice(&bytes)?;
        Ok(index)
    }
}

/// Mint a fresh generation identifier: UTC timestamp plus a short random
/// suffix so two builds in the same second never collide.
pub fn next_generation() -> String {
    let ts = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", ts, &suffix[..8])
}

// ============ Builder ============

pub struct IndexBuilder {
    provider: Arc<dyn EmbeddingProvider>,
    concurrency: usize,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, concurrency: usize) -> Self {
        Self {
            provider,
            concurrency: concurrency.max(1),
            batch_size: 64,
        }
    }

    /// Texts sent per embedding API call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Build a fresh index generation from chunks.
    pub async fn build(&self, chunks: Vec<Chunk>, generation: String) -> Result<VectorIndex> {
        let index = VectorIndex::empty(
            generation,
            self.provider.model_name().to_string(),
            self.provider.dims(),
        );
        self.merge(index, chunks).await
    }

    /// Embed chunks and insert them into an existing index. An id already
    /// present is replaced, never duplicated. Embedding calls fan out up to
    /// the configured concurrency and complete in any order; insertion is
    /// keyed by chunk id, so completion order never changes index contents.
    pub async fn merge(&self, mut index: VectorIndex, chunks: Vec<Chunk>) -> Result<VectorIndex> {
        if index.model != self.provider.model_name() {
            return Err(PipelineError::IndexConsistency {
                index_model: index.model,
                query_model: self.provider.model_name().to_string(),
            });
        }

        let batches: Vec<Vec<Chunk>> = chunks
            .chunks(self.batch_size)
            .map(|batch| batch.to_vec())
            .collect();

        let provider = Arc::clone(&self.provider);
        let results: Vec<Vec<(Chunk, Result<Vec<f32>>)>> = stream::iter(batches)
            .map(|batch| {
                let provider = Arc::clone(&provider);
                async move { embed_batch_contained(provider, batch).await }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        let results = results.into_iter().flatten();

        let mut failed = 0usize;
        for (chunk, vector) in results {
            match vector {
                Ok(vector) if !vector.is_empty() => {
                    index.entries.insert(chunk.id.clone(), IndexEntry { chunk, vector });
                }
                Ok(_) => {
                    warn!(chunk_id = %chunk.id, "empty embedding, chunk excluded");
                    failed += 1;
                }
                Err(e) => {
                    warn!(chunk_id = %chunk.id, error = %e, "embedding failed, chunk excluded");
                    failed += 1;
                }
            }
        }

        info!(
            entries = index.len(),
            failed,
            model = %index.model,
            "index merge complete"
        );
        Ok(index)
    }
}

/// Embed one batch of chunks. A failed batch call retries each chunk
/// individually, so one poison text excludes one chunk, never its whole
/// batch.
async fn embed_batch_contained(
    provider: Arc<dyn EmbeddingProvider>,
    batch: Vec<Chunk>,
) -> Vec<(Chunk, Result<Vec<f32>>)> {
    let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
    match provider.embed_batch(&texts).await {
        Ok(vectors) if vectors.len() == batch.len() => {
            batch.into_iter().zip(vectors.into_iter().map(Ok)).collect()
        }
        Ok(vectors) => {
            warn!(
                expected = batch.len(),
                got = vectors.len(),
                "embedding count mismatch, re-embedding individually"
            );
            embed_individually(provider, batch).await
        }
        Err(e) => {
            warn!(error = %e, batch = batch.len(), "batch embedding failed, re-embedding individually");
            embed_individually(provider, batch).await
        }
    }
}

async fn embed_individually(
    provider: Arc<dyn EmbeddingProvider>,
    batch: Vec<Chunk>,
) -> Vec<(Chunk, Result<Vec<f32>>)> {
    let mut out = Vec::with_capacity(batch.len());
    for chunk in batch {
        let result = provider
            .embed_batch(&[chunk.content.clone()])
            .await
            .map(|mut vs| if vs.is_empty() { Vec::new() } else { vs.swap_remove(0) });
        out.push((chunk, result));
    }
    out
}

// ============ Swap handle ============

/// Shared pointer to the live index generation.
///
/// Readers take a cheap `Arc` snapshot and never hold a lock across their
/// own search; a rebuild swaps the pointer in one write, so every query
/// sees exactly one complete generation.
pub struct IndexHandle {
    inner: RwLock<Arc<VectorIndex>>,
}

impl IndexHandle {
    pub fn new(index: VectorIndex) -> Self {
        Self {
            inner: RwLock::new(Arc::new(index)),
        }
    }

    pub fn snapshot(&self) -> Arc<VectorIndex> {
        self.inner.read().expect("index lock poisoned").clone()
    }

    pub fn swap(&self, next: VectorIndex) {
        *self.inner.write().expect("index lock poisoned") = Arc::new(next);
    }
}
