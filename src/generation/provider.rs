//! Generation provider trait and the NovelAI HTTP client.

use crate::error::{truncate_for_diagnostics, GatewayError, Result};
use crate::generation::payload::ProviderPayload;
use crate::logging::mask_secret;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, ORIGIN, PRAGMA, REFERER};
use std::time::{Duration, Instant};

/// Production generation endpoint.
pub const NOVELAI_GENERATE_URL: &str = "https://image.novelai.net/ai/generate-image";

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Trait for image generation providers.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Sends the payload and returns the raw response body.
    ///
    /// Any non-success status is an error carrying the upstream status.
    async fn generate(&self, payload: &ProviderPayload, bearer_token: &str) -> Result<Vec<u8>>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;

    /// Checks that the provider can be reached.
    async fn health_check(&self) -> Result<()>;
}

/// Builder for NovelAiProvider.
#[derive(Debug, Clone, Default)]
pub struct NovelAiProviderBuilder {
    endpoint: Option<String>,
    client: Option<reqwest::Client>,
}

impl NovelAiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the generation endpoint URL.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Shares an existing HTTP client (and its connection pool).
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the provider.
    pub fn build(self) -> Result<NovelAiProvider> {
        let endpoint = self
            .endpoint
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| NOVELAI_GENERATE_URL.to_string());
        let parsed = url::Url::parse(&endpoint)
            .map_err(|e| GatewayError::Config(format!("invalid provider endpoint {}: {}", endpoint, e)))?;
        let origin = parsed.origin().ascii_serialization();

        Ok(NovelAiProvider {
            client: self.client.unwrap_or_default(),
            endpoint,
            origin,
        })
    }
}

/// NovelAI image generation client.
#[derive(Debug, Clone)]
pub struct NovelAiProvider {
    client: reqwest::Client,
    endpoint: String,
    origin: String,
}

impl NovelAiProvider {
    /// Creates a new builder.
    pub fn builder() -> NovelAiProviderBuilder {
        NovelAiProviderBuilder::new()
    }

    /// The endpoint requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fixed browser headers the upstream requires.
    fn browser_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(ORIGIN, HeaderValue::from_static("https://novelai.net"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(REFERER, HeaderValue::from_static("https://novelai.net/"));
        headers
    }
}

#[async_trait]
impl ImageProvider for NovelAiProvider {
    async fn generate(&self, payload: &ProviderPayload, bearer_token: &str) -> Result<Vec<u8>> {
        let start = Instant::now();
        tracing::debug!(
            model = payload.model(),
            schema = %payload.schema(),
            token = %mask_secret(bearer_token),
            "sending generation request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .headers(Self::browser_headers())
            .bearer_auth(bearer_token)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = %truncate_for_diagnostics(&text),
                "provider request failed"
            );
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: truncate_for_diagnostics(&text),
            });
        }

        let body = response.bytes().await?;
        tracing::debug!(
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "provider response received"
        );
        Ok(body.to_vec())
    }

    fn name(&self) -> &str {
        "NovelAI"
    }

    async fn health_check(&self) -> Result<()> {
        // origin only
        let response = self
            .client
            .get(&self.origin)
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: format!("{} is unavailable", self.origin),
            });
        }
        Ok(())
    }
}
