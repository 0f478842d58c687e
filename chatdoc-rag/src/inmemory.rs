//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], an exhaustive-scan store
//! backed by a `Vec` kept in build order. Scans are exact and deterministic,
//! which suits the page counts of interactively uploaded documents.

use async_trait::async_trait;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// A chunk paired with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// The stored chunk.
    pub chunk: Chunk,
    /// The chunk's embedding vector.
    pub embedding: Vec<f32>,
}

/// An in-memory vector store using cosine similarity for search.
///
/// Entries are immutable after [`build`](InMemoryVectorStore::build).
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    entries: Vec<IndexEntry>,
    dimensions: usize,
}

impl InMemoryVectorStore {
    /// Pair `chunks` with `embeddings` (same order) into a new store.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if the two lists differ in
    /// length or any embedding does not have `dimensions` components.
    pub fn build(
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
        dimensions: usize,
    ) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::VectorStoreError {
                backend: "InMemory".to_string(),
                message: format!(
                    "{} chunks but {} embeddings",
                    chunks.len(),
                    embeddings.len()
                ),
            });
        }
        if let Some((chunk, embedding)) =
            chunks.iter().zip(&embeddings).find(|(_, e)| e.len() != dimensions)
        {
            return Err(RagError::VectorStoreError {
                backend: "InMemory".to_string(),
                message: format!(
                    "chunk {} has {} dimensions, expected {dimensions}",
                    chunk.chunk_id,
                    embedding.len()
                ),
            });
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();
        Ok(Self { entries, dimensions })
    }

    /// The stored entries, in build order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// NaN scores rank below everything else.
fn rank_key(score: f32) -> f32 {
    if score.is_nan() { f32::NEG_INFINITY } else { score }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if self.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if embedding.len() != self.dimensions {
            return Err(RagError::VectorStoreError {
                backend: "InMemory".to_string(),
                message: format!(
                    "query has {} dimensions, index has {}",
                    embedding.len(),
                    self.dimensions
                ),
            });
        }

        let mut scored: Vec<SearchResult> = self
            .entries
            .iter()
            .map(|entry| SearchResult {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(&entry.embedding, embedding),
            })
            .collect();

        // `sort_by` is stable, so ties keep build order.
        scored.sort_by(|a, b| rank_key(b.score).total_cmp(&rank_key(a.score)));
        scored.truncate(top_k);
        Ok(scored)
    }
}
