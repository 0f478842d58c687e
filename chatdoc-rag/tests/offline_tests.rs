//! Build without the `openai` feature: the hashing embedder and a local
//! generator must be enough to index and answer.
//!
//! Run with `cargo test -p chatdoc-rag --no-default-features`.
#![cfg(not(feature = "openai"))]

use std::sync::Arc;

use async_trait::async_trait;
use chatdoc_rag::{
    ChatSession, ConversationalRetrievalEngine, GenerationRequest, HashingEmbeddingProvider,
    RagConfig, Result, TextGenerator, Upload,
};

struct FirstLineGenerator;

#[async_trait]
impl TextGenerator for FirstLineGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        Ok(request.prompt.lines().next().unwrap_or("nothing").to_string())
    }

    fn name(&self) -> &str {
        "first-line"
    }
}

#[tokio::test]
async fn indexes_and_answers_without_http_providers() {
    let session = ChatSession::new(
        Arc::new(HashingEmbeddingProvider::new(64).unwrap()),
        Arc::new(ConversationalRetrievalEngine::new(Arc::new(FirstLineGenerator))),
    );
    let config = RagConfig::builder().chunk_size(500).chunk_overlap(50).build().unwrap();
    let report = session
        .build_index(vec![Upload::new("tea.txt", "Black tea is fully oxidized before drying.")], &config)
        .await
        .unwrap();
    assert_eq!(report.stats.chunks, 1);

    let response = session.ask("How is black tea made?", 2).await.unwrap();
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.sources[0].chunk.source, "tea.txt");
    assert_eq!(session.history().await.len(), 2);
}
