//! chatdoc server: HTTP sessions for chatting with uploaded documents.

pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;

pub use config::{EmbedderKind, ServerConfig, Services};
pub use error::ServerError;
pub use server::{AppState, app_router, run_server};
