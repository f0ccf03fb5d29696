//! HTTP surface: router, handlers and startup.

use crate::config::Config;
use crate::emitter::{EmittedResponse, ResponseSurface};
use crate::error::{GatewayError, Result};
use crate::generation::NovelAiProvider;
use crate::normalize::RequestNormalizer;
use crate::pipeline::{GenerationPipeline, GenerationRequest};
use crate::protocol::{ChatCompletionRequest, ImageGenerationRequest, ModelList};
use crate::storage::create_uploader;
use crate::translation::{ChatTranslator, Translator};
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pipeline: Arc<GenerationPipeline>,
}

impl AppState {
    /// Wraps an already wired pipeline.
    pub fn new(pipeline: GenerationPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Builds every collaborator from configuration.
    ///
    /// Fails if the storage backend is unknown or cannot be constructed.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;

        let mut provider = NovelAiProvider::builder().client(client.clone());
        if let Some(base_url) = &config.provider.base_url {
            provider = provider.endpoint(base_url.clone());
        }
        let provider = provider.build()?;
        tracing::info!(endpoint = %provider.endpoint(), "generation provider ready");

        let uploader = create_uploader(config, client.clone()).await?;

        let translator = if config.translation.enable {
            tracing::info!(url = %config.translation.url, model = %config.translation.model, "prompt translation enabled");
            Some(Arc::new(ChatTranslator::new(client.clone(), config.translation.clone())) as Arc<dyn Translator>)
        } else {
            None
        };

        Ok(Self::new(GenerationPipeline::new(
            Arc::new(provider),
            uploader,
            RequestNormalizer::new(translator, client),
            config.parameters.clone(),
            config.upload_folder(),
        )))
    }
}

/// Builds the application router.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/images/generations", post(image_generations))
        .route("/v1/models", get(list_models))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(create_cors_layer())
        .with_state(state)
}

fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

/// Binds the configured address and serves until Ctrl-C.
pub async fn serve(config: &Config) -> Result<()> {
    let state = AppState::from_config(config).await?;
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "nai-gateway listening");

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Token from `Authorization: Bearer <token>`, forwarded as-is.
fn bearer_token(headers: &HeaderMap) -> String {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim().to_string())
        .unwrap_or_default()
}

fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| GatewayError::InvalidRequest(e.to_string()))
}

async fn run(state: &AppState, request: GenerationRequest) -> Result<EmittedResponse> {
    let surface = request.surface;
    state.pipeline.run(request).await.inspect_err(|e| {
        tracing::error!(surface = ?surface, status = e.status_code().as_u16(), error = %e, "generation failed");
    })
}

async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<EmittedResponse> {
    let request: ChatCompletionRequest = decode(&body)?;
    let prompt = request.last_user_message();
    run(
        &state,
        GenerationRequest::new(
            ResponseSurface::ChatCompletions,
            request.model,
            prompt,
            bearer_token(&headers),
        ),
    )
    .await
}

async fn image_generations(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<EmittedResponse> {
    let request: ImageGenerationRequest = decode(&body)?;
    if request.n.is_some_and(|n| n > 1) {
        tracing::debug!(n = ?request.n, "only one image is generated per request");
    }
    run(
        &state,
        GenerationRequest::new(
            ResponseSurface::ImageGenerations,
            request.model,
            request.prompt,
            bearer_token(&headers),
        )
        .with_character_prompts(request.character_prompts),
    )
    .await
}

async fn list_models() -> Json<ModelList> {
    Json(ModelList::routable())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let provider = state.pipeline.provider();
    let (status, provider_status, detail) = match provider.health_check().await {
        Ok(()) => (StatusCode::OK, "ok", None),
        Err(e) => {
            tracing::warn!(provider = provider.name(), error = %e, "provider health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unreachable", Some(e.to_string()))
        }
    };

    let mut body = json!({
        "status": if status.is_success() { "ok" } else { "degraded" },
        "provider": provider.name(),
        "provider_status": provider_status,
        "storage": state.pipeline.uploader().backend().as_str(),
    });
    if let Some(detail) = detail {
        body["error"] = json!(detail);
    }
    (status, Json(body))
}
