//! Lsky Pro image host backend.

use crate::config::LskyConfig;
use crate::error::{truncate_for_diagnostics, GatewayError, Result};
use crate::storage::key;
use crate::storage::{StorageBackend, UploadResult, Uploader};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct LskyResponse {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<LskyImage>,
}

#[derive(Debug, Deserialize)]
struct LskyImage {
    #[serde(default)]
    key: String,
    /// Kilobytes.
    #[serde(default)]
    size: f64,
    links: LskyLinks,
}

#[derive(Debug, Deserialize)]
struct LskyLinks {
    url: String,
}

/// Uploads to an Lsky Pro instance through its v1 API.
#[derive(Debug, Clone)]
pub struct LskyUploader {
    client: reqwest::Client,
    config: LskyConfig,
}

impl LskyUploader {
    /// Creates the uploader; base URL and token are required.
    pub fn new(client: reqwest::Client, config: LskyConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(GatewayError::Config("lsky.base_url is required".into()));
        }
        if config.token.trim().is_empty() {
            return Err(GatewayError::Config("lsky.token is required".into()));
        }
        tracing::info!(strategy_id = config.strategy_id, "Lsky uploader ready");
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Uploader for LskyUploader {
    /// The host decides the storage path; `folder` is not used.
    async fn upload(&self, data: &[u8], file_name: &str, _folder: &str) -> Result<UploadResult> {
        let stamp = key::timestamp(&chrono::Local::now());
        let stored_name = key::stamped_name(file_name, &stamp);

        let mime = mime_guess::from_path(&stored_name).first_or_octet_stream();
        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(stored_name)
            .mime_str(mime.as_ref())
            .map_err(|e| GatewayError::upload("lsky", e.to_string()))?;
        let mut form = reqwest::multipart::Form::new().part("file", part);
        if self.config.strategy_id > 0 {
            form = form.text("strategy_id", self.config.strategy_id.to_string());
        }

        let response = self
            .client
            .post(key::join_url(&self.config.base_url, "/api/v1/upload"))
            .bearer_auth(&self.config.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| GatewayError::upload("lsky", e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::upload("lsky", e.to_string()))?;
        if status != reqwest::StatusCode::OK {
            return Err(GatewayError::upload(
                "lsky",
                format!("status {}: {}", status.as_u16(), truncate_for_diagnostics(&body)),
            ));
        }

        let parsed: LskyResponse = serde_json::from_str(&body).map_err(|e| {
            GatewayError::upload(
                "lsky",
                format!("{}: {}", e, truncate_for_diagnostics(&body)),
            )
        })?;
        if !parsed.status {
            return Err(GatewayError::upload("lsky", parsed.message));
        }
        let image = parsed
            .data
            .ok_or_else(|| GatewayError::upload("lsky", "response has no data"))?;

        Ok(UploadResult {
            url: image.links.url,
            key: image.key,
            size: (image.size * 1024.0) as u64,
            file_name: file_name.to_string(),
        })
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Lsky
    }
}
