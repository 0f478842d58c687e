use axum::{
    Json,
    extract::{multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chatdoc_rag::RagError;
use thiserror::Error;
use tracing::{error, warn};

use crate::protocol::ErrorBody;

/// Failures surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("unknown session: {0}")]
    SessionNotFound(String),

    #[error("no index has been built for this session")]
    NoIndex,

    #[error("{0}")]
    BadRequest(String),

    #[error("upload too large: {0}")]
    TooLarge(String),

    #[error(transparent)]
    Rag(#[from] RagError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::SessionNotFound(_) | Self::NoIndex => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Rag(err) => match err {
                RagError::ConfigError(_) | RagError::ChunkingError(_) => StatusCode::BAD_REQUEST,
                RagError::NotReady | RagError::SessionBusy(_) => StatusCode::CONFLICT,
                RagError::IngestionError { .. } | RagError::PipelineError(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                RagError::EmbeddingError { .. } | RagError::GenerationError { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                RagError::VectorStoreError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ServerError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_library_errors_to_status_codes() {
        let cases = [
            (RagError::ConfigError("top_k".into()), StatusCode::BAD_REQUEST),
            (RagError::NotReady, StatusCode::CONFLICT),
            (RagError::SessionBusy("answer"), StatusCode::CONFLICT),
            (RagError::PipelineError("nothing readable".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (
                RagError::GenerationError { provider: "x".into(), message: "down".into() },
                StatusCode::BAD_GATEWAY,
            ),
            (
                RagError::VectorStoreError { backend: "InMemory".into(), message: "bad".into() },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ServerError::from(err).status(), expected);
        }
        assert_eq!(ServerError::SessionNotFound("abc".into()).status(), StatusCode::NOT_FOUND);
    }
}
