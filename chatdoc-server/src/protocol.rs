use chatdoc_rag::{AnswerResponse, SearchResult, Turn};
use serde::{Deserialize, Serialize};

pub type SessionId = String;

/// Retrieval count used when a question does not name one.
pub const DEFAULT_TOP_K: usize = 4;

/// Longest chunk excerpt returned with an answer, in characters.
pub const PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreateResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceView {
    /// 1-based rank in the retrieval result.
    pub rank: usize,
    pub chunk_id: usize,
    pub source: String,
    pub page: u32,
    pub score: f32,
    pub preview: String,
}

impl SourceView {
    fn from_result(rank: usize, result: &SearchResult) -> Self {
        Self {
            rank,
            chunk_id: result.chunk.chunk_id,
            source: result.chunk.source.clone(),
            page: result.chunk.page,
            score: result.score,
            preview: preview(&result.chunk.text),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub answer: String,
    pub sources: Vec<SourceView>,
}

impl From<AnswerResponse> for QuestionResponse {
    fn from(response: AnswerResponse) -> Self {
        let sources = response
            .sources
            .iter()
            .enumerate()
            .map(|(i, result)| SourceView::from_result(i + 1, result))
            .collect();
        Self { answer: response.answer, sources }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub turns: Vec<Turn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// First [`PREVIEW_CHARS`] characters of `text`, with `...` appended when
/// anything was cut.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
