//! Retrieval-augmented answering.
//!
//! [`AnsweringEngine`] is the seam between a session and the strategy that
//! turns a question into a grounded answer. [`ConversationalRetrievalEngine`]
//! retrieves, composes one prompt with context and history, and calls a
//! [`TextGenerator`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use crate::config::RagConfig;
use crate::conversation::HistoryPair;
use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::generation::{GenerationRequest, TextGenerator};
use crate::index::DocumentIndex;
use crate::prompt::{compose_prompt, render_context, render_history};

/// Everything needed to answer one question.
#[derive(Debug, Clone, Copy)]
pub struct AnswerRequest<'a> {
    /// The user's question.
    pub question: &'a str,
    /// Prior question/answer pairs, oldest first.
    pub history: &'a [HistoryPair],
    /// The index to retrieve from.
    pub index: &'a DocumentIndex,
    /// Number of chunks to retrieve.
    pub top_k: usize,
}

/// A generated answer with the chunks it was grounded on.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnswerResponse {
    /// Generated answer text.
    pub answer: String,
    /// Retrieved chunks, best first.
    pub sources: Vec<SearchResult>,
}

/// A strategy for answering questions from an index.
#[async_trait]
pub trait AnsweringEngine: Send + Sync {
    /// Answer `request.question`.
    async fn answer(&self, request: AnswerRequest<'_>) -> Result<AnswerResponse>;
}

/// Retrieve → compose → generate, with conversation history in the prompt.
///
/// # Example
///
/// ```rust,ignore
/// use chatdoc_rag::{AnswerRequest, AnsweringEngine, ConversationalRetrievalEngine};
///
/// let engine = ConversationalRetrievalEngine::new(generator);
/// let response = engine
///     .answer(AnswerRequest { question: "What is X?", history: &[], index: &index, top_k: 4 })
///     .await?;
/// ```
pub struct ConversationalRetrievalEngine {
    generator: Arc<dyn TextGenerator>,
    max_new_tokens: u32,
    max_context_chars: usize,
}

impl ConversationalRetrievalEngine {
    /// Create an engine with the default generation and context limits.
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        let defaults = RagConfig::default();
        Self {
            generator,
            max_new_tokens: defaults.max_new_tokens,
            max_context_chars: defaults.max_context_chars,
        }
    }

    /// Take generation and context limits from `config`.
    pub fn with_config(mut self, config: &RagConfig) -> Self {
        self.max_new_tokens = config.max_new_tokens;
        self.max_context_chars = config.max_context_chars;
        self
    }
}

#[async_trait]
impl AnsweringEngine for ConversationalRetrievalEngine {
    async fn answer(&self, request: AnswerRequest<'_>) -> Result<AnswerResponse> {
        let sources = request.index.query(request.question, request.top_k).await?;

        let context = render_context(&sources, self.max_context_chars);
        let history = render_history(request.history);
        let prompt = compose_prompt(request.question, &context, &history);

        let generated = self
            .generator
            .generate(GenerationRequest { prompt, max_new_tokens: self.max_new_tokens })
            .await
            .map_err(|e| {
                error!(generator = self.generator.name(), error = %e, "generation failed");
                match e {
                    RagError::GenerationError { .. } => e,
                    other => RagError::GenerationError {
                        provider: self.generator.name().to_string(),
                        message: other.to_string(),
                    },
                }
            })?;

        let answer = generated.trim();
        if answer.is_empty() {
            return Err(RagError::GenerationError {
                provider: self.generator.name().to_string(),
                message: "model returned an empty completion".to_string(),
            });
        }

        info!(
            generator = self.generator.name(),
            source_count = sources.len(),
            history_pairs = request.history.len(),
            "answered question"
        );
        Ok(AnswerResponse { answer: answer.to_string(), sources })
    }
}
