//! Text-generation capability used by the answering engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single, self-contained generation call.
///
/// Generators keep no memory between calls, so the prompt must carry every
/// piece of context the model should see.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    /// The fully composed prompt.
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_new_tokens: u32,
}

/// A stateless prompt-in, text-out language model.
///
/// Implementations are long-lived handles: construct one at startup and
/// share it behind an `Arc`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `request`.
    async fn generate(&self, request: GenerationRequest) -> Result<String>;

    /// Short generator name used in logs and errors.
    fn name(&self) -> &str;
}
