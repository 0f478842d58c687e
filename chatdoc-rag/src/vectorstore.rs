//! Vector store trait for nearest-neighbor search over chunk embeddings.

use async_trait::async_trait;

use crate::document::SearchResult;
use crate::error::Result;

/// A read-only collection of embedded chunks supporting similarity search.
///
/// A store is populated once, when an index is built, and never updated
/// afterwards; rebuilding produces a new store.
///
/// # Example
///
/// ```rust,ignore
/// use chatdoc_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::build(chunks, embeddings, 384)?;
/// let results = store.search(&query_embedding, 4).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Number of stored chunks.
    fn len(&self) -> usize;

    /// Whether the store holds no chunks.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensionality shared by every stored embedding.
    fn dimensions(&self) -> usize;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns at most `min(top_k, len())` results ordered by descending
    /// similarity score. Equal scores keep insertion order.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;
}
