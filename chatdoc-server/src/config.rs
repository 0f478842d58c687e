//! Process configuration read from the environment.

use std::sync::Arc;

use anyhow::{Context, bail};
use chatdoc_rag::{
    AnsweringEngine, ConversationalRetrievalEngine, EmbeddingProvider, HashingEmbeddingProvider,
    OpenAIChatGenerator, OpenAIEmbeddingProvider, RagConfig, TextGenerator,
};
use tracing::info;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8299;
const DEFAULT_HASHING_DIMENSIONS: usize = 384;
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Which embedding backend encodes chunks and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    /// Offline feature hashing.
    Hashing,
    /// An OpenAI-compatible `/embeddings` endpoint.
    OpenAI,
}

impl std::str::FromStr for EmbedderKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hashing" => Ok(Self::Hashing),
            "openai" => Ok(Self::OpenAI),
            other => bail!("unknown embedder '{other}', expected 'hashing' or 'openai'"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub embedder: EmbedderKind,
    /// Output size of the embedding model; required for keyless
    /// OpenAI-compatible servers.
    pub embedding_dimensions: Option<usize>,
    pub openai_base_url: Option<String>,
    pub embedding_model: Option<String>,
    pub chat_model: String,
    pub openai_api_key: Option<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            embedder: EmbedderKind::Hashing,
            embedding_dimensions: None,
            openai_base_url: None,
            embedding_model: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            openai_api_key: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Capability handles shared by every session.
#[derive(Clone)]
pub struct Services {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub engine: Arc<dyn AnsweringEngine>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").field("embedder", &self.embedder.name()).finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Load `.env` if present, then read `CHATDOC_*` and `OPENAI_API_KEY`.
    pub fn from_env() -> anyhow::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match var("CHATDOC_PORT") {
            Some(port) => port.parse::<u16>().with_context(|| format!("invalid CHATDOC_PORT '{port}'"))?,
            None => defaults.port,
        };
        let embedder = match var("CHATDOC_EMBEDDER") {
            Some(kind) => kind.parse()?,
            None => defaults.embedder,
        };
        let embedding_dimensions = var("CHATDOC_EMBEDDING_DIMENSIONS")
            .map(|d| {
                d.parse::<usize>().with_context(|| format!("invalid CHATDOC_EMBEDDING_DIMENSIONS '{d}'"))
            })
            .transpose()?;
        let max_upload_bytes = match var("CHATDOC_MAX_UPLOAD_BYTES") {
            Some(bytes) => bytes
                .parse::<usize>()
                .with_context(|| format!("invalid CHATDOC_MAX_UPLOAD_BYTES '{bytes}'"))?,
            None => defaults.max_upload_bytes,
        };

        Ok(Self {
            host: var("CHATDOC_HOST").unwrap_or(defaults.host),
            port,
            embedder,
            embedding_dimensions,
            openai_base_url: var("CHATDOC_OPENAI_BASE_URL"),
            embedding_model: var("CHATDOC_EMBEDDING_MODEL"),
            chat_model: var("CHATDOC_CHAT_MODEL").unwrap_or(defaults.chat_model),
            openai_api_key: var("OPENAI_API_KEY"),
            max_upload_bytes,
        })
    }

    /// Construct the embedding provider and answering engine once, at
    /// startup.
    pub fn build_services(&self) -> anyhow::Result<Services> {
        let embedder = self.build_embedder()?;
        let generator = self.build_generator()?;
        info!(
            embedder = embedder.name(),
            dimensions = embedder.dimensions(),
            generator = generator.name(),
            "providers ready"
        );
        let engine = ConversationalRetrievalEngine::new(generator).with_config(&RagConfig::default());
        Ok(Services { embedder, engine: Arc::new(engine) })
    }

    fn build_embedder(&self) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        match self.embedder {
            EmbedderKind::Hashing => {
                let dimensions = self.embedding_dimensions.unwrap_or(DEFAULT_HASHING_DIMENSIONS);
                Ok(Arc::new(HashingEmbeddingProvider::new(dimensions)?))
            }
            EmbedderKind::OpenAI => {
                let mut provider = match (&self.openai_api_key, &self.openai_base_url) {
                    (Some(key), _) => {
                        let provider = OpenAIEmbeddingProvider::new(key.clone())?;
                        match self.embedding_dimensions {
                            Some(dimensions) => provider.with_dimensions(dimensions),
                            None => provider,
                        }
                    }
                    (None, Some(base_url)) => {
                        let dimensions = self.embedding_dimensions.context(
                            "CHATDOC_EMBEDDING_DIMENSIONS is required for a keyless embedding server",
                        )?;
                        let model = self
                            .embedding_model
                            .clone()
                            .context("CHATDOC_EMBEDDING_MODEL is required for a keyless embedding server")?;
                        OpenAIEmbeddingProvider::compatible(base_url.clone(), model, dimensions)
                    }
                    (None, None) => {
                        bail!("CHATDOC_EMBEDDER=openai needs OPENAI_API_KEY or CHATDOC_OPENAI_BASE_URL")
                    }
                };
                if let Some(base_url) = &self.openai_base_url {
                    provider = provider.with_base_url(base_url.clone());
                }
                if let Some(model) = &self.embedding_model {
                    provider = provider.with_model(model.clone());
                }
                Ok(Arc::new(provider))
            }
        }
    }

    fn build_generator(&self) -> anyhow::Result<Arc<dyn TextGenerator>> {
        let generator = match (&self.openai_api_key, &self.openai_base_url) {
            (Some(key), base_url) => {
                let mut generator = OpenAIChatGenerator::new(key.clone())?.with_model(self.chat_model.clone());
                if let Some(base_url) = base_url {
                    generator = generator.with_base_url(base_url.clone());
                }
                generator
            }
            (None, Some(base_url)) => OpenAIChatGenerator::compatible(base_url.clone(), self.chat_model.clone()),
            (None, None) => bail!("no text generator configured: set OPENAI_API_KEY or CHATDOC_OPENAI_BASE_URL"),
        };
        Ok(Arc::new(generator))
    }
}
