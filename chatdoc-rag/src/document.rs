//! Data types for documents, chunks, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One unit of extracted text (a PDF page, or a whole text file).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The text content of the document.
    pub text: String,
    /// Identifier of the upload the text came from.
    pub source: String,
    /// 1-based page number within the source.
    pub page: u32,
    /// Additional key-value metadata carried onto every chunk.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with empty extra metadata.
    pub fn new(source: impl Into<String>, page: u32, text: impl Into<String>) -> Self {
        Self { text: text.into(), source: source.into(), page, metadata: HashMap::new() }
    }
}

/// A contiguous passage of a [`Document`], the unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Zero-based identifier, sequential within one indexing run.
    pub chunk_id: usize,
    /// The text content of the chunk.
    pub text: String,
    /// Source identifier inherited from the parent document.
    pub source: String,
    /// Page number inherited from the parent document.
    pub page: u32,
    /// Metadata inherited from the parent document.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The cosine similarity score (higher is more relevant).
    pub score: f32,
}
