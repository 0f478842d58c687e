//! A queryable document index: chunks, their embeddings, and the provider
//! used to encode queries against them.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::chunking::{chunk_documents, chunker_for};
use crate::config::RagConfig;
use crate::document::{Chunk, Document, SearchResult};
use crate::embedding::{EmbeddingProvider, check_dimensions};
use crate::error::{RagError, Result};
use crate::inmemory::InMemoryVectorStore;
use crate::vectorstore::VectorStore;

/// Summary of a built index.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IndexSummary {
    /// Pages (documents) fed to the chunker.
    pub pages: usize,
    /// Chunks stored in the index.
    pub chunks: usize,
    /// Embedding dimensionality.
    pub dimensions: usize,
}

/// Chunks plus embeddings, queried by text.
///
/// The index keeps the provider it was built with so that queries are always
/// encoded into the same vector space as the stored chunks.
pub struct DocumentIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    summary: IndexSummary,
}

impl std::fmt::Debug for DocumentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("embedder", &self.embedder.name())
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl DocumentIndex {
    /// Chunk `documents` according to `config`, embed every chunk, and build
    /// a fresh index.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] / [`RagError::ChunkingError`] for invalid
    ///   chunking parameters
    /// - [`RagError::PipelineError`] if the documents produce no chunks
    /// - [`RagError::EmbeddingError`] if the provider fails; nothing is built
    pub async fn build(
        documents: &[Document],
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let chunker = chunker_for(config)?;
        let chunks = chunk_documents(documents, chunker.as_ref());
        if chunks.is_empty() {
            return Err(RagError::PipelineError(
                "no text could be chunked from the provided documents".to_string(),
            ));
        }

        let mut index = Self::from_chunks(chunks, embedder).await?;
        index.summary.pages = documents.len();
        Ok(index)
    }

    /// Embed `chunks` with `embedder` and store them in build order.
    ///
    /// An empty chunk list yields an empty, queryable index.
    pub async fn from_chunks(
        chunks: Vec<Chunk>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(&texts).await.map_err(|e| {
                error!(provider = embedder.name(), error = %e, "embedding failed during index build");
                e
            })?
        };

        if embeddings.len() != chunks.len() {
            return Err(RagError::EmbeddingError {
                provider: embedder.name().to_string(),
                message: format!(
                    "requested {} embeddings, provider returned {}",
                    chunks.len(),
                    embeddings.len()
                ),
            });
        }
        for embedding in &embeddings {
            check_dimensions(embedder.as_ref(), embedding)?;
        }

        let dimensions = embedder.dimensions();
        let chunk_count = chunks.len();
        let store = InMemoryVectorStore::build(chunks, embeddings, dimensions)?;
        info!(provider = embedder.name(), chunk_count, dimensions, "built document index");

        Ok(Self {
            store: Arc::new(store),
            embedder,
            summary: IndexSummary { pages: 0, chunks: chunk_count, dimensions },
        })
    }

    /// Wrap an already-populated store.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the store and the provider
    /// disagree on dimensionality.
    pub fn from_store(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        if !store.is_empty() && store.dimensions() != embedder.dimensions() {
            return Err(RagError::ConfigError(format!(
                "store has {} dimensions but provider '{}' produces {}",
                store.dimensions(),
                embedder.name(),
                embedder.dimensions()
            )));
        }
        let summary =
            IndexSummary { pages: 0, chunks: store.len(), dimensions: embedder.dimensions() };
        Ok(Self { store, embedder, summary })
    }

    /// Return the `k` chunks most similar to `text`, best first.
    ///
    /// An empty index returns an empty list without calling the provider.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `k` is zero, or the provider's
    /// or store's error if encoding or searching fails.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.store.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(text).await.map_err(|e| {
            error!(provider = self.embedder.name(), error = %e, "embedding failed during query");
            e
        })?;
        check_dimensions(self.embedder.as_ref(), &embedding)?;

        let results = self.store.search(&embedding, k).await?;
        debug!(top_k = k, result_count = results.len(), "index queried");
        Ok(results)
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Page, chunk and dimension counts.
    pub fn summary(&self) -> &IndexSummary {
        &self.summary
    }
}
