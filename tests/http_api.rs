//! Drives the HTTP surface over a real socket.
//!
//! The QA provider is the `http` backend pointed at a stub answer service
//! running in the same test, so nothing leaves localhost.

use axum::{routing::post, Json, Router};
use docqa::config::Config;
use docqa::engine::Engine;
use docqa::server::{router, serve};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, app));
    addr
}

/// Answers with the first line of the context it was given.
async fn stub_answer(Json(body): Json<Value>) -> Json<Value> {
    let question = body["question"].as_str().unwrap_or_default();
    if question.contains("explode") {
        return Json(json!({ "error": "model overloaded" }));
    }
    let context = body["context"].as_str().unwrap_or_default();
    let first = context.lines().next().unwrap_or_default();
    Json(json!({ "answer": format!("from context: {}", first) }))
}

async fn start_docqa(max_upload_bytes: usize) -> String {
    let qa_addr = spawn(Router::new().route("/qa", post(stub_answer))).await;

    let mut config = Config::default();
    config.ocr.primary = "disabled".to_string();
    config.ocr.fallback = "disabled".to_string();
    config.qa.provider = "http".to_string();
    config.qa.endpoint = Some(format!("http://{}/qa", qa_addr));
    config.qa.timeout_secs = 5;
    config.validate().unwrap();

    let engine = Arc::new(Engine::from_config(&config).unwrap());
    let addr = spawn(router(engine, max_upload_bytes)).await;
    format!("http://{}", addr)
}

async fn upload(client: &reqwest::Client, base: &str, content_type: &str, body: &'static [u8]) -> reqwest::Response {
    client
        .post(format!("{}/documents?name=notes.txt", base))
        .header("content-type", content_type)
        .body(body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_reports_version() {
    let base = start_docqa(1024 * 1024).await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn upload_ask_session_reset_round_trip() {
    let base = start_docqa(1024 * 1024).await;
    let client = reqwest::Client::new();

    let resp = upload(&client, &base, "text/plain", b"The launch is scheduled for Tuesday.").await;
    assert_eq!(resp.status(), 200);
    let receipt: Value = resp.json().await.unwrap();
    assert_eq!(receipt["backend"], "plain-text");
    assert_eq!(receipt["chunk_count"], 1);
    let document_id = receipt["document_id"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{}/ask", base))
        .json(&json!({ "document_id": document_id, "question": "When is the launch?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let answer: Value = resp.json().await.unwrap();
    assert_eq!(
        answer["answer"],
        "from context: The launch is scheduled for Tuesday."
    );
    assert_eq!(answer["citations"][0], "The launch is scheduled for Tuesday.");

    let session: Value = client
        .get(format!("{}/session", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["document"]["name"], "notes.txt");
    assert_eq!(session["turns"][0]["question"], "When is the launch?");
    assert_eq!(session["turns"][0]["outcome"]["status"], "answered");

    let text: Value = client
        .get(format!("{}/document/text", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(text["text"], "The launch is scheduled for Tuesday.");

    let resp = client.post(format!("{}/reset", base)).send().await.unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .get(format!("{}/document/text", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NO_ACTIVE_DOCUMENT");
}

#[tokio::test]
async fn error_codes_map_to_statuses() {
    let base = start_docqa(1024 * 1024).await;
    let client = reqwest::Client::new();

    let resp = upload(&client, &base, "application/zip", b"PK\x03\x04").await;
    assert_eq!(resp.status(), 415);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UNSUPPORTED_TYPE");

    let resp = upload(&client, &base, "text/plain", b"  \n  ").await;
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "EXTRACTION_EMPTY");
    assert_eq!(body["error"]["attempts"][0]["backend"], "plain-text");

    let resp = client
        .post(format!("{}/ask", base))
        .json(&json!({ "document_id": "nope", "question": "anything?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let receipt: Value = upload(&client, &base, "text/plain", b"some content")
        .await
        .json()
        .await
        .unwrap();
    let document_id = receipt["document_id"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{}/ask", base))
        .json(&json!({ "document_id": document_id, "question": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/ask", base))
        .json(&json!({ "document_id": document_id, "question": "please explode" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "BACKEND_UNAVAILABLE");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("model overloaded"));
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let base = start_docqa(16).await;
    let client = reqwest::Client::new();
    let resp = upload(&client, &base, "text/plain", b"this body is longer than sixteen bytes").await;
    assert_eq!(resp.status(), 413);
}
