//! Error types for the `chatdoc-rag` crate.

use thiserror::Error;

/// Errors that can occur while indexing documents or answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during document chunking.
    #[error("Chunking error: {0}")]
    ChunkingError(String),

    /// A single uploaded document could not be turned into text.
    #[error("Ingestion error ({source_name}): {message}")]
    IngestionError {
        /// The sanitized name of the upload that failed.
        source_name: String,
        /// A description of the failure.
        message: String,
    },

    /// The text-generation capability failed or returned nothing usable.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generator that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the indexing or answering orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// A question was asked before any index was built.
    #[error("No documents have been indexed yet")]
    NotReady,

    /// The session is already running the named operation.
    #[error("Session busy: {0} already in progress")]
    SessionBusy(&'static str),
}

impl RagError {
    /// Whether the error originates from an external capability provider
    /// (embedding or generation) rather than from the caller's input.
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Self::EmbeddingError { .. } | Self::GenerationError { .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
