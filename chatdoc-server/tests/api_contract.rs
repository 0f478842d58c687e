use std::sync::Arc;

use async_trait::async_trait;
use chatdoc_rag::{
    ConversationalRetrievalEngine, GenerationRequest, HashingEmbeddingProvider, Result, TextGenerator,
};
use chatdoc_server::{AppState, Services, app_router};
use reqwest::{StatusCode, multipart};
use serde_json::{Value, json};

/// Replies with the number of prompt lines so answers are never empty.
struct EchoGenerator;

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        Ok(format!("answer from {} prompt lines", request.prompt.lines().count()))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

async fn spawn_server_with(max_upload_bytes: usize) -> (String, tokio::task::JoinHandle<()>) {
    let services = Services {
        embedder: Arc::new(HashingEmbeddingProvider::new(128).expect("hashing embedder")),
        engine: Arc::new(ConversationalRetrievalEngine::new(Arc::new(EchoGenerator))),
    };
    let app = app_router(AppState::new(services).with_max_upload_bytes(max_upload_bytes));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });
    (format!("http://{}", addr), handle)
}

async fn spawn_server() -> (String, tokio::task::JoinHandle<()>) {
    spawn_server_with(1024 * 1024).await
}

async fn create_session(client: &reqwest::Client, base: &str) -> String {
    let response = client
        .post(format!("{}/api/sessions", base))
        .send()
        .await
        .expect("session create");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("session json");
    body.get("session_id")
        .and_then(Value::as_str)
        .expect("session_id")
        .to_string()
}

fn text_part(name: &str, text: &str) -> multipart::Part {
    multipart::Part::bytes(text.as_bytes().to_vec())
        .file_name(name.to_string())
        .mime_str("text/plain")
        .expect("mime")
}

async fn upload(client: &reqwest::Client, base: &str, session_id: &str, form: multipart::Form) -> reqwest::Response {
    client
        .post(format!("{}/api/sessions/{}/documents", base, session_id))
        .multipart(form)
        .send()
        .await
        .expect("upload response")
}

async fn ask(client: &reqwest::Client, base: &str, session_id: &str, body: Value) -> reqwest::Response {
    client
        .post(format!("{}/api/sessions/{}/questions", base, session_id))
        .json(&body)
        .send()
        .await
        .expect("question response")
}

#[tokio::test]
async fn health_reports_ok() {
    let (base, handle) = spawn_server().await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .expect("health response")
        .json()
        .await
        .expect("health json");
    assert_eq!(body["status"], "ok");
    handle.abort();
}

#[tokio::test]
async fn upload_then_ask_returns_ranked_sources() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;

    let long_text = format!("Volcanoes erupt molten rock. {}", "Lava cools into basalt. ".repeat(40));
    let form = multipart::Form::new()
        .part("file", text_part("geology notes.txt", &long_text))
        .part("file", text_part("baking.txt", "Bread rises because yeast ferments sugar."))
        .text("chunk_size", "500")
        .text("chunk_overlap", "50");
    let response = upload(&client, &base, &session_id, form).await;
    assert_eq!(response.status(), StatusCode::OK);
    let report: Value = response.json().await.expect("report json");
    assert_eq!(report["stats"]["files_indexed"], 2);
    assert_eq!(report["stats"]["chunk_size"], 500);
    assert!(report["stats"]["chunks"].as_u64().expect("chunk count") >= 3);
    assert_eq!(report["failures"], json!([]));

    let response = ask(&client, &base, &session_id, json!({"question": "What does lava cool into?", "top_k": 2})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let answer: Value = response.json().await.expect("answer json");
    assert!(answer["answer"].as_str().expect("answer text").starts_with("answer from"));
    let sources = answer["sources"].as_array().expect("sources");
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["rank"], 1);
    assert_eq!(sources[1]["rank"], 2);
    assert_eq!(sources[0]["source"], "geology_notes.txt");
    assert_eq!(sources[0]["page"], 1);
    assert!(sources[0]["score"].as_f64() >= sources[1]["score"].as_f64());
    assert!(sources[0]["preview"].as_str().expect("preview").chars().count() <= 503);

    let history: Value = client
        .get(format!("{}/api/sessions/{}/history", base, session_id))
        .send()
        .await
        .expect("history response")
        .json()
        .await
        .expect("history json");
    let turns = history["turns"].as_array().expect("turns");
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["role"], "user");
    assert_eq!(turns[0]["content"], "What does lava cool into?");
    assert_eq!(turns[1]["role"], "assistant");

    let stats: Value = client
        .get(format!("{}/api/sessions/{}/index", base, session_id))
        .send()
        .await
        .expect("index response")
        .json()
        .await
        .expect("index json");
    assert_eq!(stats["dimensions"], 128);

    handle.abort();
}

#[tokio::test]
async fn asking_before_upload_conflicts() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;

    let response = ask(&client, &base, &session_id, json!({"question": "Anything?"})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("error json");
    assert!(body["error"].as_str().expect("error text").contains("indexed"));

    let response = client
        .get(format!("{}/api/sessions/{}/index", base, session_id))
        .send()
        .await
        .expect("index response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    handle.abort();
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = ask(&client, &base, "missing", json!({"question": "hello?"})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .get(format!("{}/api/sessions/missing/history", base))
        .send()
        .await
        .expect("history response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    handle.abort();
}

#[tokio::test]
async fn out_of_range_parameters_are_rejected() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;

    let form = multipart::Form::new()
        .part("file", text_part("a.txt", "some text"))
        .text("chunk_size", "100");
    assert_eq!(upload(&client, &base, &session_id, form).await.status(), StatusCode::BAD_REQUEST);

    let form = multipart::Form::new()
        .part("file", text_part("a.txt", "some text"))
        .text("chunk_overlap", "lots");
    assert_eq!(upload(&client, &base, &session_id, form).await.status(), StatusCode::BAD_REQUEST);

    let form = multipart::Form::new().text("chunk_size", "800");
    assert_eq!(upload(&client, &base, &session_id, form).await.status(), StatusCode::BAD_REQUEST);

    let form = multipart::Form::new().part("file", text_part("a.txt", "the sky is blue"));
    assert_eq!(upload(&client, &base, &session_id, form).await.status(), StatusCode::OK);

    for top_k in [1, 9] {
        let response = ask(&client, &base, &session_id, json!({"question": "sky?", "top_k": top_k})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    let response = ask(&client, &base, &session_id, json!({"question": "   "})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    handle.abort();
}

#[tokio::test]
async fn unreadable_uploads_are_unprocessable() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;

    let form = multipart::Form::new()
        .part(
            "file",
            multipart::Part::bytes(vec![0x89, 0x50, 0x4e, 0x47])
                .file_name("photo.png")
                .mime_str("image/png")
                .expect("mime"),
        )
        .part("file", text_part("blank.txt", "   "));
    let response = upload(&client, &base, &session_id, form).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.expect("error json");
    assert!(body["error"].as_str().expect("error text").contains("photo.png"));

    handle.abort();
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let (base, handle) = spawn_server_with(1024).await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;

    let form = multipart::Form::new().part("file", text_part("big.txt", &"word ".repeat(2000)));
    let response = upload(&client, &base, &session_id, form).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    handle.abort();
}

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;

    let response = ask(&client, &base, &session_id, json!({"top_k": 4})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("error json");
    assert!(body["error"].as_str().expect("error text").contains("question"));

    let response = client
        .post(format!("{}/api/sessions/{}/questions", base, session_id))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("question response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("error json");
    assert!(body["error"].is_string());

    let response = client
        .post(format!("{}/api/sessions/{}/documents", base, session_id))
        .header("content-type", "text/plain")
        .body("just some text")
        .send()
        .await
        .expect("upload response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("error json");
    assert!(body["error"].is_string());

    handle.abort();
}

#[tokio::test]
async fn deleted_session_is_gone() {
    let (base, handle) = spawn_server().await;
    let client = reqwest::Client::new();
    let session_id = create_session(&client, &base).await;

    let form = multipart::Form::new().part("file", text_part("a.txt", "the sky is blue"));
    assert_eq!(upload(&client, &base, &session_id, form).await.status(), StatusCode::OK);

    let response = client
        .delete(format!("{}/api/sessions/{}", base, session_id))
        .send()
        .await
        .expect("delete response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client
        .get(format!("{}/api/sessions/{}/history", base, session_id))
        .send()
        .await
        .expect("history response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .delete(format!("{}/api/sessions/{}", base, session_id))
        .send()
        .await
        .expect("second delete response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.expect("error json");
    assert!(body["error"].as_str().expect("error text").contains(&session_id));

    let health: Value = reqwest::get(format!("{}/health", base))
        .await
        .expect("health response")
        .json()
        .await
        .expect("health json");
    assert_eq!(health["sessions"], 0);

    handle.abort();
}
