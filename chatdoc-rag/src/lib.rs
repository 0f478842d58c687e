//! # chatdoc-rag
//!
//! Conversational question answering over uploaded documents.
//!
//! Uploads are split into page-level [`Document`]s, chunked with overlap,
//! embedded, and stored in an in-memory cosine index. Each question retrieves
//! the best chunks, which are composed with the conversation so far into a
//! single grounded prompt for a [`TextGenerator`].
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chatdoc_rag::{ChatSession, ConversationalRetrievalEngine, HashingEmbeddingProvider,
//!     RagConfig, Upload};
//!
//! let engine = Arc::new(ConversationalRetrievalEngine::new(generator));
//! let session = ChatSession::new(Arc::new(HashingEmbeddingProvider::new(384)?), engine);
//! session.build_index(vec![Upload::new("notes.txt", text)], &RagConfig::default()).await?;
//! let response = session.ask("What is in my notes?", 4).await?;
//! ```

pub mod answer;
pub mod chunking;
pub mod config;
pub mod conversation;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod hashing;
pub mod index;
pub mod inmemory;
pub mod ingestion;
#[cfg(feature = "openai")]
pub mod openai;
pub mod prompt;
pub mod session;
pub mod vectorstore;

pub use answer::{AnswerRequest, AnswerResponse, AnsweringEngine, ConversationalRetrievalEngine};
pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker, chunk_documents, chunker_for};
pub use config::{ChunkingStrategy, RagConfig, RagConfigBuilder};
pub use conversation::{Conversation, HistoryPair, Role, Turn};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generation::{GenerationRequest, TextGenerator};
pub use hashing::HashingEmbeddingProvider;
pub use index::{DocumentIndex, IndexSummary};
pub use inmemory::{InMemoryVectorStore, IndexEntry};
pub use ingestion::{DocumentKind, IngestFailure, IngestReport, Upload, ingest_uploads};
#[cfg(feature = "openai")]
pub use openai::{OpenAIChatGenerator, OpenAIEmbeddingProvider};
pub use session::{ChatSession, IndexReport, IndexStats};
pub use vectorstore::VectorStore;
