use std::sync::Arc;

use axum::{
    body::Body,
    extract::Query,
    http::{Method, Request, StatusCode},
    routing::post,
    Json, Router,
};
use safebus_backend::{
    models::chat::ChatRequest,
    services::{ChatModel, GeminiClient},
};
use serde_json::{json, Value};
use std::collections::HashMap;
use tower::ServiceExt;

mod support;

use support::{test_config, TestApp};

/// Serves `generateContent` on an ephemeral port, answering with `reply`
/// and echoing the request so tests can inspect what was sent.
async fn spawn_fake_backend(reply: Value) -> String {
    let app = Router::new().route(
        "/v1beta/models/{model}",
        post(
            move |Query(params): Query<HashMap<String, String>>, Json(body): Json<Value>| {
                let reply = reply.clone();
                async move {
                    if params.get("key").map(String::as_str) != Some("test-key") {
                        return (StatusCode::FORBIDDEN, Json(json!({"error": "bad key"})));
                    }
                    assert_eq!(body["contents"][0]["parts"][0]["text"], "ETA");
                    assert!(body["systemInstruction"]["parts"][0]["text"]
                        .as_str()
                        .is_some_and(|prompt| prompt.contains("SafeBus")));
                    (StatusCode::OK, Json(reply))
                }
            },
        ),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn app_against(reply: Value) -> TestApp {
    let mut config = test_config();
    config.gemini_api_key = Some("test-key".into());
    config.gemini_api_base = spawn_fake_backend(reply).await;
    let client = GeminiClient::from_config(&config).unwrap().expect("client");
    let model: Arc<dyn ChatModel> = Arc::new(client);
    TestApp::with_chat_model(config, Some(model))
}

#[tokio::test]
async fn chat_relays_candidate_text() {
    let app = app_against(json!({
        "candidates": [{ "content": { "parts": [{ "text": "14 minutes" }] } }]
    }))
    .await;

    let (status, body) = app
        .request(Method::POST, "/chat", None, Some(json!({"message": "ETA"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"reply": "14 minutes"}));
}

#[tokio::test]
async fn chat_accepts_alternate_reply_shapes() {
    let app = app_against(json!({ "choices": [{ "message": { "content": "On the way" } }] })).await;
    let (status, body) = app
        .request(Method::POST, "/chat", None, Some(json!({"message": "ETA"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "On the way");
}

#[tokio::test]
async fn chat_without_text_is_empty_reply() {
    let app = app_against(json!({ "candidates": [] })).await;
    let (status, body) = app
        .request(Method::POST, "/chat", None, Some(json!({"message": "ETA"})))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "empty_reply"}));
}

#[tokio::test]
async fn chat_rejects_blank_message() {
    let app = TestApp::new();
    for payload in [json!({"message": ""}), json!({"message": "   "}), json!({})] {
        let (status, body) = app.request(Method::POST, "/chat", None, Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "bad_request"}));
    }
}

#[tokio::test]
async fn chat_rejects_malformed_body() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/chat")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_without_key_reports_missing_api_key() {
    let app = TestApp::new();
    let (status, body) = app
        .request(
            Method::POST,
            "/chat",
            None,
            Some(serde_json::to_value(ChatRequest { message: Some("ETA".into()) }).unwrap()),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "missing_api_key"}));
}

#[tokio::test]
async fn chat_upstream_failure_is_upstream_error() {
    let mut config = test_config();
    config.gemini_api_key = Some("wrong-key".into());
    config.gemini_api_base = spawn_fake_backend(json!({})).await;
    let client = GeminiClient::from_config(&config).unwrap().expect("client");
    let app = TestApp::with_chat_model(config, Some(Arc::new(client)));

    let (status, body) = app
        .request(Method::POST, "/chat", None, Some(json!({"message": "ETA"})))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "upstream_error"}));
}

#[tokio::test]
async fn health_and_check_secret() {
    let app = TestApp::new();
    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert!(body["ts"].as_i64().is_some_and(|ts| ts > 0));

    let (_, body) = app.request(Method::GET, "/check-secret", None, None).await;
    assert_eq!(body, json!({"hasGeminiKey": false}));

    let mut config = test_config();
    config.gemini_api_key = Some("k".into());
    let app = TestApp::with_chat_model(config, None);
    let (_, body) = app.request(Method::GET, "/check-secret", None, None).await;
    assert_eq!(body, json!({"hasGeminiKey": true}));
}
