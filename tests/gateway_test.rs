//! End-to-end tests through the HTTP router.
//!
//! The provider and the translation endpoint are mock servers; storage is an
//! in-memory stub so upload failures can be injected.

use async_trait::async_trait;
use base64::Engine;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use nai_gateway::config::{GenerationConfig, TranslationConfig};
use nai_gateway::generation::{NovelAiProvider, V3_QUALITY_SUFFIX, V4_QUALITY_SUFFIX};
use nai_gateway::normalize::RequestNormalizer;
use nai_gateway::translation::ChatTranslator;
use nai_gateway::{
    build_app, AppState, GatewayError, GenerationPipeline, Result, StorageBackend, Translator,
    UploadResult, Uploader,
};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const GENERATE_PATH: &str = "/ai/generate-image";

fn archive(entry: &str, data: &[u8]) -> Vec<u8> {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer.start_file(entry, SimpleFileOptions::default()).unwrap();
    writer.write_all(data).unwrap();
    writer.finish().unwrap().into_inner()
}

struct MemoryStore;

#[async_trait]
impl Uploader for MemoryStore {
    async fn upload(&self, data: &[u8], file_name: &str, folder: &str) -> Result<UploadResult> {
        Ok(UploadResult {
            url: format!("https://img.test/{}/{}", folder, file_name),
            key: format!("{}/{}", folder, file_name),
            size: data.len() as u64,
            file_name: file_name.to_string(),
        })
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Minio
    }
}

struct BrokenStore;

#[async_trait]
impl Uploader for BrokenStore {
    async fn upload(&self, _data: &[u8], _file_name: &str, _folder: &str) -> Result<UploadResult> {
        Err(GatewayError::upload("minio", "connection refused"))
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Minio
    }
}

struct Harness {
    server: MockServer,
}

impl Harness {
    async fn start(provider_body: ResponseTemplate) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(provider_body)
            .mount(&server)
            .await;
        Self { server }
    }

    async fn with_image() -> Self {
        Self::start(ResponseTemplate::new(200).set_body_bytes(archive("image_0.png", b"\x89PNG")))
            .await
    }

    fn app(&self, uploader: Arc<dyn Uploader>, translator: Option<Arc<dyn Translator>>) -> axum::Router {
        let client = reqwest::Client::new();
        let provider = NovelAiProvider::builder()
            .endpoint(format!("{}{}", self.server.uri(), GENERATE_PATH))
            .client(client.clone())
            .build()
            .unwrap();
        build_app(AppState::new(GenerationPipeline::new(
            Arc::new(provider),
            uploader,
            RequestNormalizer::new(translator, client),
            GenerationConfig::default(),
            "nai-images",
        )))
    }

    /// Bodies of every request the provider received.
    async fn provider_bodies(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == GENERATE_PATH)
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", "Bearer pst-test-token")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_chat_completion_streams_one_chunk() {
    let harness = Harness::with_image().await;
    let app = harness.app(Arc::new(MemoryStore), None);

    let response = app
        .oneshot(post(
            "/v1/chat/completions",
            json!({
                "model": "nai-diffusion-3",
                "messages": [
                    {"role": "system", "content": "draw"},
                    {"role": "user", "content": "1girl, smile"}
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    let text = body_text(response).await;

    assert_eq!(text.matches("data: ").count(), 1);
    assert!(text.ends_with("event: end\n\n"));
    let data = text
        .strip_prefix("data: ")
        .and_then(|rest| rest.split("\n\n").next())
        .unwrap();
    let chunk: Value = serde_json::from_str(data).unwrap();
    assert_eq!(chunk["object"], "chat.completion.chunk");
    assert_eq!(chunk["model"], "nai-diffusion-3");
    let content = chunk["choices"][0]["delta"]["content"].as_str().unwrap();
    assert!(content.starts_with("![") && content.contains("](https://img.test/nai-images/"));

    let bodies = harness.provider_bodies().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["model"], "nai-diffusion-3");
    assert_eq!(bodies[0]["input"], format!("1girl, smile{}", V3_QUALITY_SUFFIX));
    assert!(bodies[0]["parameters"].get("reference_image_multiple").is_none());
    assert!(bodies[0]["parameters"].get("reference_strength_multiple").is_none());

    let requests = harness.server.received_requests().await.unwrap();
    assert_eq!(requests[0].headers["authorization"], "Bearer pst-test-token");
}

#[tokio::test]
async fn test_image_generation_with_translation() {
    let harness = Harness::with_image().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "a fluffy cat"}}]
        })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let translator = ChatTranslator::new(
        reqwest::Client::new(),
        TranslationConfig {
            url: harness.server.uri(),
            key: "sk-translate".into(),
            model: "gpt-4o-mini".into(),
            role: "Translate to English.".into(),
            enable: true,
        },
    );
    let app = harness.app(Arc::new(MemoryStore), Some(Arc::new(translator)));

    let response = app
        .oneshot(post(
            "/v1/images/generations",
            json!({"model": "nai-diffusion-4-5-full", "prompt": "a cat", "n": 1, "size": "1024x1024"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    let url = body["data"][0]["url"].as_str().unwrap();
    assert!(url.starts_with("https://img.test/nai-images/nai4_"));
    assert!(body["created"].as_i64().unwrap() > 0);
    assert_eq!(body["usage"]["prompt_tokens"], 0);

    let bodies = harness.provider_bodies().await;
    let expected = format!("a fluffy cat{}", V4_QUALITY_SUFFIX);
    let params = &bodies[0]["parameters"];
    assert_eq!(bodies[0]["model"], "nai-diffusion-4-5-full");
    assert_eq!(bodies[0]["input"], expected);
    assert_eq!(params["v4_prompt"]["caption"]["base_caption"], expected);
    assert_eq!(
        params["v4_prompt"]["caption"]["char_captions"][0]["char_caption"],
        expected
    );
    assert_eq!(
        params["v4_prompt"]["caption"]["char_captions"][0]["centers"][0],
        json!({"x": 0.0, "y": 0.0})
    );
    assert_eq!(
        params["v4_negative_prompt"]["caption"]["char_captions"]
            .as_array()
            .unwrap()
            .len(),
        1
    );
}

const REFERENCE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nreference";

async fn mount_reference(harness: &Harness) -> String {
    Mock::given(method("GET"))
        .and(path("/ref.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(REFERENCE_PNG))
        .expect(1)
        .mount(&harness.server)
        .await;
    format!("{}/ref.png", harness.server.uri())
}

fn assert_reference_fields(parameters: &Value) {
    let encoded = base64::engine::general_purpose::STANDARD.encode(REFERENCE_PNG);
    assert_eq!(parameters["reference_image_multiple"], json!([encoded]));
    assert_eq!(parameters["reference_information_extracted_multiple"], json!([1]));
    assert_eq!(parameters["reference_strength_multiple"], json!([0.6]));
}

#[tokio::test]
async fn test_linked_reference_image_v3() {
    let harness = Harness::with_image().await;
    let link = mount_reference(&harness).await;
    let app = harness.app(Arc::new(MemoryStore), None);

    let response = app
        .oneshot(post(
            "/v1/chat/completions",
            json!({
                "model": "nai-diffusion-3",
                "messages": [{"role": "user", "content": format!("1girl, like this {}", link)}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bodies = harness.provider_bodies().await;
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0]["parameters"].get("v4_prompt").is_none());
    assert_reference_fields(&bodies[0]["parameters"]);
}

#[tokio::test]
async fn test_linked_reference_image_v4() {
    let harness = Harness::with_image().await;
    let link = mount_reference(&harness).await;
    let app = harness.app(Arc::new(MemoryStore), None);

    let response = app
        .oneshot(post(
            "/v1/images/generations",
            json!({
                "model": "nai-diffusion-4-5-full",
                "prompt": format!("a cat {}", link)
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bodies = harness.provider_bodies().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["model"], "nai-diffusion-4-5-full");
    assert!(bodies[0]["parameters"].get("v4_prompt").is_some());
    assert_reference_fields(&bodies[0]["parameters"]);
}

#[tokio::test]
async fn test_unknown_model_uses_v3_fallback() {
    let harness = Harness::with_image().await;
    let app = harness.app(Arc::new(MemoryStore), None);

    let response = app
        .oneshot(post("/v1/images/generations", json!({"model": "foo", "prompt": "a cat"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    let url = body["data"][0]["url"].as_str().unwrap();
    assert!(!url.contains("nai4_"));

    let bodies = harness.provider_bodies().await;
    assert_eq!(bodies[0]["model"], "nai-diffusion-3");
    assert_eq!(bodies[0]["input"], format!("a cat{}", V3_QUALITY_SUFFIX));
    assert!(bodies[0]["parameters"].get("v4_prompt").is_none());
    assert!(bodies[0]["parameters"].get("sm").is_some());
}

#[tokio::test]
async fn test_disabled_character_prompts_are_dropped() {
    let harness = Harness::with_image().await;
    let app = harness.app(Arc::new(MemoryStore), None);

    let response = app
        .oneshot(post(
            "/v1/images/generations",
            json!({
                "model": "nai-diffusion-4-full",
                "prompt": "two girls",
                "character_prompts": [
                    {"prompt": "girl, red hair", "uc": "", "center": {"x": 0.3, "y": 0.5}, "enabled": true},
                    {"prompt": "girl, blue hair", "uc": "", "center": {"x": 0.7, "y": 0.5}, "enabled": false}
                ]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bodies = harness.provider_bodies().await;
    let params = &bodies[0]["parameters"];
    let positive = params["v4_prompt"]["caption"]["char_captions"].as_array().unwrap();
    let negative = params["v4_negative_prompt"]["caption"]["char_captions"].as_array().unwrap();
    assert_eq!(positive.len(), 1);
    assert_eq!(negative.len(), 1);
    assert_eq!(positive[0]["char_caption"], "girl, red hair");
    assert_eq!(params["characterPrompts"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_failure_keeps_envelope() {
    let harness = Harness::with_image().await;

    let response = harness
        .app(Arc::new(BrokenStore), None)
        .oneshot(post(
            "/v1/chat/completions",
            json!({"model": "nai-diffusion-3", "messages": [{"role": "user", "content": "x"}]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    assert!(text.contains("](error: upload failed - "));
    assert!(text.ends_with("event: end\n\n"));

    let response = harness
        .app(Arc::new(BrokenStore), None)
        .oneshot(post(
            "/v1/images/generations",
            json!({"model": "nai-diffusion-3", "prompt": "x"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    let url = body["data"][0]["url"].as_str().unwrap();
    let name = url.strip_prefix("error: upload failed - ").unwrap();
    assert!(name.ends_with(".png"));
    assert!(name.trim_end_matches(".png").parse::<i64>().is_ok());
}

#[tokio::test]
async fn test_missing_image_entry_is_bad_gateway() {
    let harness =
        Harness::start(ResponseTemplate::new(200).set_body_bytes(archive("metadata.json", b"{}"))).await;

    let response = harness
        .app(Arc::new(MemoryStore), None)
        .oneshot(post(
            "/v1/images/generations",
            json!({"model": "nai-diffusion-3", "prompt": "x"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"]["code"], "upstream_no_image");
}

#[tokio::test]
async fn test_provider_status_is_passed_through() {
    let harness = Harness::start(ResponseTemplate::new(401).set_body_string("Unauthorized")).await;

    let response = harness
        .app(Arc::new(MemoryStore), None)
        .oneshot(post(
            "/v1/chat/completions",
            json!({"model": "nai-diffusion-3", "messages": [{"role": "user", "content": "x"}]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"]["code"], "upstream_error");
    assert!(body["error"]["message"].as_str().unwrap().contains("Unauthorized"));
}

#[tokio::test]
async fn test_non_archive_response_is_server_error() {
    let harness = Harness::start(ResponseTemplate::new(200).set_body_string("<html>busy</html>")).await;

    let response = harness
        .app(Arc::new(MemoryStore), None)
        .oneshot(post(
            "/v1/images/generations",
            json!({"model": "nai-diffusion-3", "prompt": "x"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"]["code"], "upstream_not_archive");
}

#[tokio::test]
async fn test_malformed_body_is_rejected_before_provider_call() {
    let harness = Harness::with_image().await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from("{\"model\": "))
        .unwrap();
    let response = harness
        .app(Arc::new(MemoryStore), None)
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"]["type"], "invalid_request_error");
    assert!(harness.provider_bodies().await.is_empty());
}

#[tokio::test]
async fn test_cors_preflight() {
    let harness = Harness::with_image().await;

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/v1/images/generations")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type,authorization")
        .body(Body::empty())
        .unwrap();
    let response = harness
        .app(Arc::new(MemoryStore), None)
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert!(harness.provider_bodies().await.is_empty());
}

#[tokio::test]
async fn test_health_and_models() {
    let harness = Harness::with_image().await;
    let app = harness.app(Arc::new(MemoryStore), None);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["provider_status"], "ok");
    assert_eq!(body["storage"], "minio");

    let response = app
        .oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"nai-diffusion-3"));
    assert!(ids.contains(&"nai-diffusion-4-5-full"));
}

#[tokio::test]
async fn test_health_reports_unreachable_provider() {
    let provider = NovelAiProvider::builder()
        .endpoint(format!("http://127.0.0.1:1{}", GENERATE_PATH))
        .build()
        .unwrap();
    let app = build_app(AppState::new(GenerationPipeline::new(
        Arc::new(provider),
        Arc::new(MemoryStore),
        RequestNormalizer::new(None, reqwest::Client::new()),
        GenerationConfig::default(),
        "nai-images",
    )));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["provider_status"], "unreachable");
    assert!(body["error"].as_str().unwrap().contains("network error"));
}

#[tokio::test]
async fn test_health_reports_failing_provider_host() {
    let harness = Harness::with_image().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&harness.server)
        .await;
    let app = harness.app(Arc::new(MemoryStore), None);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["provider_status"], "unreachable");
}
