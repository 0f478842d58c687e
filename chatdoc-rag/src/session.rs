//! Session-scoped state: the current index and the conversation.
//!
//! A [`ChatSession`] is the unit of ownership for everything one user
//! accumulates: the index built from their uploads and their question/answer
//! log. Capability handles (embedder, answering engine) are injected once
//! and shared.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::answer::{AnswerRequest, AnswerResponse, AnsweringEngine};
use crate::config::RagConfig;
use crate::conversation::{Conversation, Turn};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::DocumentIndex;
use crate::ingestion::{IngestFailure, Upload, ingest_uploads};

/// What the current index was built from.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexStats {
    /// Uploads that contributed at least one page.
    pub files_indexed: usize,
    /// Pages extracted across those uploads.
    pub pages: usize,
    /// Chunks stored in the index.
    pub chunks: usize,
    /// Embedding dimensionality.
    pub dimensions: usize,
    /// Chunk size used for the build.
    pub chunk_size: usize,
    /// Chunk overlap used for the build.
    pub chunk_overlap: usize,
    /// When the index replaced its predecessor.
    pub built_at: DateTime<Utc>,
}

/// Outcome of a successful index build.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexReport {
    /// Statistics of the new index.
    pub stats: IndexStats,
    /// Uploads that were skipped.
    pub failures: Vec<IngestFailure>,
}

/// One user's index and conversation.
///
/// At most one index build and at most one answer run at a time; a second
/// concurrent attempt fails fast with [`RagError::SessionBusy`].
pub struct ChatSession {
    embedder: Arc<dyn EmbeddingProvider>,
    engine: Arc<dyn AnsweringEngine>,
    /// The current index together with the stats it was built with.
    current: RwLock<Option<(Arc<DocumentIndex>, IndexStats)>>,
    conversation: RwLock<Conversation>,
    build_guard: Mutex<()>,
    answer_guard: Mutex<()>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession").field("embedder", &self.embedder.name()).finish_non_exhaustive()
    }
}

impl ChatSession {
    /// Create an empty session using the given capabilities.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, engine: Arc<dyn AnsweringEngine>) -> Self {
        Self {
            embedder,
            engine,
            current: RwLock::new(None),
            conversation: RwLock::new(Conversation::new()),
            build_guard: Mutex::new(()),
            answer_guard: Mutex::new(()),
        }
    }

    /// Ingest `uploads`, then chunk, embed and index them, replacing the
    /// previous index.
    ///
    /// Unreadable uploads are reported in [`IndexReport::failures`]. The
    /// previous index stays in place if the build fails or the returned
    /// future is dropped before completion. The conversation is kept.
    ///
    /// # Errors
    ///
    /// - [`RagError::SessionBusy`] if another build is running
    /// - [`RagError::ConfigError`] if `config` is invalid
    /// - [`RagError::PipelineError`] if no upload yields any text
    /// - [`RagError::EmbeddingError`] if the provider fails
    pub async fn build_index(&self, uploads: Vec<Upload>, config: &RagConfig) -> Result<IndexReport> {
        let _guard = self.build_guard.try_lock().map_err(|_| RagError::SessionBusy("index build"))?;
        config.validate()?;

        let upload_count = uploads.len();
        let report = tokio::task::spawn_blocking(move || ingest_uploads(&uploads))
            .await
            .map_err(|e| RagError::PipelineError(format!("ingestion task failed: {e}")))?;

        if report.documents.is_empty() {
            let reasons: Vec<String> =
                report.failures.iter().map(|f| format!("{}: {}", f.source, f.message)).collect();
            warn!(upload_count, "no readable uploads");
            return Err(RagError::PipelineError(format!(
                "none of the {upload_count} uploaded file(s) contained readable text ({})",
                reasons.join("; ")
            )));
        }

        let index = DocumentIndex::build(&report.documents, config, Arc::clone(&self.embedder)).await?;
        let summary = index.summary().clone();
        let stats = IndexStats {
            files_indexed: report.files_loaded,
            pages: summary.pages,
            chunks: summary.chunks,
            dimensions: summary.dimensions,
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            built_at: Utc::now(),
        };

        *self.current.write().await = Some((Arc::new(index), stats.clone()));

        info!(
            files = stats.files_indexed,
            pages = stats.pages,
            chunks = stats.chunks,
            skipped = report.failures.len(),
            "index replaced"
        );
        Ok(IndexReport { stats, failures: report.failures })
    }

    /// Answer `question` from the current index, using prior turns as
    /// conversational context.
    ///
    /// The question and answer are appended to the conversation together,
    /// and only when answering succeeds.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] for a blank question or `top_k == 0`
    /// - [`RagError::SessionBusy`] if another answer is in flight
    /// - [`RagError::NotReady`] if no index has been built
    /// - any retrieval or [`RagError::GenerationError`] from the engine
    pub async fn ask(&self, question: &str, top_k: usize) -> Result<AnswerResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::ConfigError("question must not be empty".to_string()));
        }
        if top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }

        let _guard = self.answer_guard.try_lock().map_err(|_| RagError::SessionBusy("answer"))?;
        let index = self
            .current
            .read()
            .await
            .as_ref()
            .map(|(index, _)| Arc::clone(index))
            .ok_or(RagError::NotReady)?;
        let history = self.conversation.read().await.pairs();

        let response = self
            .engine
            .answer(AnswerRequest { question, history: &history, index: &index, top_k })
            .await?;

        let mut conversation = self.conversation.write().await;
        conversation.append(Turn::user(question));
        conversation.append(Turn::assistant(response.answer.clone()));
        Ok(response)
    }

    /// Every turn so far, oldest first.
    pub async fn history(&self) -> Vec<Turn> {
        self.conversation.read().await.turns().to_vec()
    }

    /// Statistics of the current index, if one was built.
    pub async fn stats(&self) -> Option<IndexStats> {
        self.current.read().await.as_ref().map(|(_, stats)| stats.clone())
    }

    /// Whether questions can be answered.
    pub async fn is_ready(&self) -> bool {
        self.current.read().await.is_some()
    }
}
