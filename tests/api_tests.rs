//! Router-level tests for the analysis endpoints, driven in-process with a
//! fake upstream model so no network traffic leaves the test.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

use emotion_decoder::decoder::EmotionDecoder;
use emotion_decoder::llm::{GenerativeModel, ImagePart};
use emotion_decoder::storage::StorageClient;
use emotion_decoder::{build_router, AppState};

struct FakeModel {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl FakeModel {
    fn ok(reply: &str) -> Arc<Self> {
        Arc::new(FakeModel {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(FakeModel {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GenerativeModel for FakeModel {
    async fn generate(&self, _prompt: &str, _image: Option<&ImagePart>) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(|message| anyhow!(message))
    }
}

fn setup_app(model: Arc<FakeModel>) -> axum::Router {
    let decoder = Arc::new(EmotionDecoder::new(model));
    let storage = Arc::new(StorageClient::new("", "", false));
    build_router(AppState::new(decoder, storage))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

#[tokio::test]
async fn health_reports_service_and_parseable_timestamp() {
    let app = setup_app(FakeModel::ok("{}"));

    let request = Request::builder()
        .method("GET")
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "emotion-decoder");
    assert!(body["version"].is_string());
    let timestamp = body["timestamp"].as_str().expect("timestamp string");
    DateTime::parse_from_rfc3339(timestamp).expect("RFC 3339 timestamp");
}

#[tokio::test]
async fn text_endpoint_rejects_missing_text_without_upstream_call() {
    let fake = FakeModel::ok("{}");
    let app = setup_app(fake.clone());

    let response = app
        .oneshot(post_json("/api/analyze/text", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Text is required");
    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn text_endpoint_rejects_blank_text() {
    let fake = FakeModel::ok("{}");
    let app = setup_app(fake.clone());

    let response = app
        .oneshot(post_json("/api/analyze/text", json!({ "text": "   " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn text_endpoint_returns_extracted_record_with_metadata() {
    let fake = FakeModel::ok(
        "Here you go: ```json\n{\"primary_emotion\":\"joy\",\"confidence\":92}\n```",
    );
    let app = setup_app(fake.clone());

    let before = Utc::now();
    let response = app
        .oneshot(post_json(
            "/api/analyze/text",
            json!({ "text": "I got the job!" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["primary_emotion"], "joy");
    assert_eq!(body["confidence"], 92);
    assert_eq!(body["input_type"], "text");
    let timestamp = DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).unwrap();
    assert!(timestamp.with_timezone(&Utc) >= before);
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn text_endpoint_falls_back_to_raw_reply_on_prose() {
    let app = setup_app(FakeModel::ok("I think it's happy"));

    let response = app
        .oneshot(post_json("/api/analyze/text", json!({ "text": "hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["primary_emotion"], "unknown");
    assert_eq!(body["confidence"], 0);
    assert_eq!(body["raw_response"], "I think it's happy");
    assert_eq!(body["explanation"], "I think it's happy");
}

#[tokio::test]
async fn upstream_failure_surfaces_as_error_record_not_http_error() {
    let app = setup_app(FakeModel::failing("connection refused"));

    let response = app
        .oneshot(post_json("/api/analyze/text", json!({ "text": "hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], true);
    assert_eq!(body["primary_emotion"], "error");
    assert_eq!(body["confidence"], 0);
    assert!(body["message"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn image_endpoint_rejects_when_no_image_source_given() {
    let fake = FakeModel::ok("{}");
    let app = setup_app(fake.clone());

    let response = app
        .oneshot(post_json("/api/analyze/image", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Image data or URI is required");
    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn image_endpoint_accepts_storage_uri() {
    let fake = FakeModel::ok("{\"primary_emotion\":\"surprise\",\"confidence\":70}");
    let app = setup_app(fake.clone());

    let response = app
        .oneshot(post_json(
            "/api/analyze/image",
            json!({ "image_uri": "gs://emotion-chatbot-assets/face.jpg" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["input_type"], "image");
    assert_eq!(body["primary_emotion"], "surprise");
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn image_endpoint_accepts_inline_base64() {
    let fake = FakeModel::ok("{\"primary_emotion\":\"neutral\"}");
    let app = setup_app(fake.clone());

    // "hello" in base64; mime sniffing falls back to jpeg for unknown bytes.
    let response = app
        .oneshot(post_json(
            "/api/analyze/image",
            json!({ "image": "aGVsbG8=" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["input_type"], "image");
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn multimodal_endpoint_requires_text() {
    let fake = FakeModel::ok("{}");
    let app = setup_app(fake.clone());

    let response = app
        .oneshot(post_json(
            "/api/analyze/multimodal",
            json!({ "image_uri": "gs://bucket/face.jpg" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Text is required");
    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn multimodal_endpoint_requires_an_image_source() {
    let fake = FakeModel::ok("{}");
    let app = setup_app(fake.clone());

    let response = app
        .oneshot(post_json(
            "/api/analyze/multimodal",
            json!({ "text": "mixed feelings" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Image data or URI is required");
    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn multimodal_endpoint_passes_open_schema_through() {
    let fake = FakeModel::ok(
        "```json\n{\"primary_emotion\":\"joy\",\"text_emotion\":\"joy\",\"image_emotion\":\"neutral\",\"consistency\":\"misaligned\"}\n```",
    );
    let app = setup_app(fake.clone());

    let response = app
        .oneshot(post_json(
            "/api/analyze/multimodal",
            json!({ "text": "great news", "image_uri": "gs://bucket/face.jpg" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["input_type"], "multimodal");
    assert_eq!(body["text_emotion"], "joy");
    assert_eq!(body["image_emotion"], "neutral");
    assert_eq!(body["consistency"], "misaligned");
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}
