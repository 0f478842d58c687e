use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, State,
        multipart::{Field, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chatdoc_rag::{ChatSession, IndexReport, IndexStats, RagConfig, Upload, config::check_top_k};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    config::{ServerConfig, Services},
    error::ServerError,
    protocol::{DEFAULT_TOP_K, HistoryResponse, QuestionRequest, QuestionResponse, SessionCreateResponse},
    session::SessionManager,
};

#[derive(Clone, Debug)]
pub struct AppState {
    pub sessions: SessionManager,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self { sessions: SessionManager::new(services), max_upload_bytes: ServerConfig::default().max_upload_bytes }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    async fn session(&self, session_id: &str) -> Result<Arc<ChatSession>, ServerError> {
        self.sessions.get(session_id).await.ok_or_else(|| ServerError::SessionNotFound(session_id.to_string()))
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let upload_limit = state.max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{session_id}", delete(delete_session))
        .route(
            "/api/sessions/{session_id}/documents",
            post(upload_documents).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/sessions/{session_id}/questions", post(ask_question))
        .route("/api/sessions/{session_id}/history", get(history))
        .route("/api/sessions/{session_id}/index", get(index_stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let services = config.build_services().context("failed to set up model providers")?;
    let state = AppState::new(services).with_max_upload_bytes(config.max_upload_bytes);
    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for chatdoc-server")?;

    let listener =
        tokio::net::TcpListener::bind(addr).await.with_context(|| format!("failed to bind {addr}"))?;
    info!("chatdoc-server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({"status":"ok","service":"chatdoc-server","sessions":state.sessions.count().await}))
}

async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session_id = state.sessions.create_session().await;
    info!(session_id = %session_id, "session created");
    (StatusCode::CREATED, Json(SessionCreateResponse { session_id }))
}

async fn delete_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ServerError> {
    if !state.sessions.remove(&session_id).await {
        return Err(ServerError::SessionNotFound(session_id));
    }
    info!(session_id = %session_id, "session deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_documents(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<IndexReport>, ServerError> {
    let session = state.session(&session_id).await?;
    let mut multipart = multipart?;

    let mut uploads = Vec::new();
    let mut config = RagConfig::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("document").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                let upload = Upload::new(file_name, bytes.to_vec());
                uploads.push(match content_type {
                    Some(content_type) => upload.with_content_type(content_type),
                    None => upload,
                });
            }
            Some("chunk_size") => config.chunk_size = number_field(field, "chunk_size").await?,
            Some("chunk_overlap") => config.chunk_overlap = number_field(field, "chunk_overlap").await?,
            _ => {}
        }
    }

    if uploads.is_empty() {
        return Err(ServerError::BadRequest("expected at least one 'file' part".to_string()));
    }
    config.validate()?;
    config.check_interactive_bounds()?;

    let report = session.build_index(uploads, &config).await?;
    info!(
        session_id = %session_id,
        chunks = report.stats.chunks,
        skipped = report.failures.len(),
        "documents indexed"
    );
    Ok(Json(report))
}

async fn ask_question(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    request: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<QuestionResponse>, ServerError> {
    let Json(request) = request?;
    let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K);
    check_top_k(top_k)?;
    let session = state.session(&session_id).await?;
    let response = session.ask(&request.question, top_k).await?;
    Ok(Json(response.into()))
}

async fn history(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<HistoryResponse>, ServerError> {
    let session = state.session(&session_id).await?;
    Ok(Json(HistoryResponse { turns: session.history().await }))
}

async fn index_stats(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<IndexStats>, ServerError> {
    let session = state.session(&session_id).await?;
    session.stats().await.map(Json).ok_or(ServerError::NoIndex)
}

async fn number_field(field: Field<'_>, name: &str) -> Result<usize, ServerError> {
    let text = field.text().await.map_err(multipart_error)?;
    text.trim()
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("{name} must be a whole number, got '{}'", text.trim())))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::TooLarge(err.body_text())
    } else {
        ServerError::BadRequest(err.body_text())
    }
}
