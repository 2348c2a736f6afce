//! Relay tests against a stubbed Generative Language upstream.

use axum::{body::Body, http::StatusCode, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hce_advisor::{
    api::{routes, RateLimiter},
    auth::{SessionProvider, StaticTokenSessions},
    services::{gemini::GeminiClient, smart_title::SmartTitler},
    storage::{self, SeaOrmChatRepository},
};

async fn relay_app(upstream: &MockServer, rate_limit: u32) -> Router {
    let db_conn = storage::init_db("sqlite::memory:").await.unwrap();
    let llm = Arc::new(GeminiClient::new(
        upstream.uri(),
        Some("test-key".to_string()),
        "gemini-2.5-pro".to_string(),
        "gemini-2.5-flash".to_string(),
    ));
    let sessions: Arc<dyn SessionProvider> =
        Arc::new(StaticTokenSessions::from_entries(&[]));

    let state = routes::AppState {
        repo: Arc::new(SeaOrmChatRepository::new(db_conn)),
        llm: llm.clone(),
        titler: Arc::new(SmartTitler::new(llm)),
        sessions,
        ai_limiter: RateLimiter::new(rate_limit),
    };
    routes::create_router(state)
}

fn post_json(uri: &str, body: Value) -> axum::http::Request<Body> {
    axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn upstream_text(text: &str) -> Value {
    json!({
        "candidates": [
            { "content": { "parts": [{ "text": text }] } }
        ]
    })
}

#[tokio::test]
async fn ai_relays_the_upstream_answer() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/models/gemini-2.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upstream_text(
            "Chào bạn, điểm chuẩn năm ngoái khoảng 24 điểm.",
        )))
        .expect(1)
        .mount(&upstream)
        .await;

    let app = relay_app(&upstream, 1000).await;
    let response = app
        .oneshot(post_json(
            "/api/ai",
            json!({ "prompt": "Điểm chuẩn năm ngoái?" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["text"], "Chào bạn, điểm chuẩn năm ngoái khoảng 24 điểm.");
}

#[tokio::test]
async fn ai_maps_upstream_failures_to_bad_gateway() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/models/gemini-2.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&upstream)
        .await;

    let app = relay_app(&upstream, 1000).await;
    let response = app
        .oneshot(post_json("/api/ai", json!({ "prompt": "Học phí?" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("quota exceeded"));
}

#[tokio::test]
async fn smart_title_uses_the_json_payload() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upstream_text(
            "{\"title\": \"Điểm chuẩn ngành Kế toán\"}",
        )))
        .mount(&upstream)
        .await;

    let app = relay_app(&upstream, 1000).await;
    let response = app
        .oneshot(post_json(
            "/api/smart-title",
            json!({ "text": "Cho mình hỏi điểm chuẩn ngành Kế toán với?" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["title"], "Điểm chuẩn ngành Kế toán");
}

#[tokio::test]
async fn smart_title_falls_back_to_the_users_text() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&upstream)
        .await;

    let app = relay_app(&upstream, 1000).await;
    let response = app
        .oneshot(post_json(
            "/api/smart-title",
            json!({ "text": "Điểm chuẩn ngành Kế toán?" }),
        ))
        .await
        .unwrap();

    // Upstream trouble must not break the client; the cleaned question serves
    // as the title.
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["title"], "Điểm chuẩn ngành Kế toán");
}

#[tokio::test]
async fn relay_endpoints_are_rate_limited_per_ip() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/models/gemini-2.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upstream_text("ok")))
        .mount(&upstream)
        .await;

    let app = relay_app(&upstream, 1).await;

    let first = app
        .clone()
        .oneshot(post_json("/api/ai", json!({ "prompt": "một" })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(post_json("/api/ai", json!({ "prompt": "hai" })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}
