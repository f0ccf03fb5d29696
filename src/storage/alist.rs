//! Alist file manager backend.

use crate::config::AlistConfig;
use crate::error::{GatewayError, Result};
use crate::storage::key;
use crate::storage::{StorageBackend, UploadResult, Uploader};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_PATH: &str = "/uploads";
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
const SUCCESS_CODE: i64 = 200;

#[derive(Debug, Deserialize)]
struct AlistEnvelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    #[serde(default)]
    raw_url: String,
}

/// Uploads through the Alist form API, then resolves the direct link.
#[derive(Debug, Clone)]
pub struct AlistUploader {
    client: reqwest::Client,
    config: AlistConfig,
    token: String,
}

impl AlistUploader {
    /// Creates the uploader.
    ///
    /// Uses the configured token when present, otherwise logs in with the
    /// configured username and password.
    pub async fn connect(client: reqwest::Client, config: AlistConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(GatewayError::Config("alist.base_url is required".into()));
        }

        if !config.token.is_empty() {
            tracing::info!("Alist uploader ready (configured token)");
            let token = config.token.clone();
            return Ok(Self {
                client,
                config,
                token,
            });
        }

        if config.username.is_empty() || config.password.is_empty() {
            return Err(GatewayError::Config(
                "alist requires a token or username and password".into(),
            ));
        }

        let token = login(&client, &config).await?;
        tracing::info!(user = %config.username, "Alist uploader ready (logged in)");
        Ok(Self {
            client,
            config,
            token,
        })
    }

    fn api(&self, path: &str) -> String {
        key::join_url(&self.config.base_url, path)
    }

    fn base_path(&self) -> String {
        let path = self.config.path.trim().trim_end_matches('/');
        if path.is_empty() {
            DEFAULT_BASE_PATH.to_string()
        } else if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        }
    }

    /// Full Alist path of the stored file.
    fn file_key(&self, folder: &str, file_name: &str, stamp: &str) -> String {
        format!(
            "{}/{}",
            self.base_path(),
            key::relative_key(folder, file_name, stamp)
        )
    }

    /// Direct-download URL guessed from the key.
    fn fallback_url(&self, key: &str) -> String {
        format!("{}/d{}", self.config.base_url.trim_end_matches('/'), key)
    }

    /// Asks Alist for the file's real direct link.
    async fn raw_url(&self, path: &str) -> Result<String> {
        let response = self
            .client
            .post(self.api("/api/fs/get"))
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .json(&json!({ "path": path, "password": "" }))
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await
            .map_err(|e| GatewayError::upload("alist", e.to_string()))?;

        let envelope: AlistEnvelope<FileInfo> = response
            .json()
            .await
            .map_err(|e| GatewayError::upload("alist", e.to_string()))?;
        if envelope.code != SUCCESS_CODE {
            return Err(GatewayError::upload("alist", envelope.message));
        }
        envelope
            .data
            .map(|d| d.raw_url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| GatewayError::upload("alist", "file has no direct link"))
    }
}

async fn login(client: &reqwest::Client, config: &AlistConfig) -> Result<String> {
    let response = client
        .post(key::join_url(&config.base_url, "/api/auth/login"))
        .json(&json!({ "username": config.username, "password": config.password }))
        .send()
        .await
        .map_err(|e| GatewayError::Config(format!("alist login failed: {}", e)))?;

    let envelope: AlistEnvelope<LoginData> = response
        .json()
        .await
        .map_err(|e| GatewayError::Config(format!("alist login response: {}", e)))?;
    if envelope.code != SUCCESS_CODE {
        return Err(GatewayError::Config(format!(
            "alist login failed: {}",
            envelope.message
        )));
    }
    envelope
        .data
        .map(|d| d.token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GatewayError::Config("alist login returned no token".into()))
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl Uploader for AlistUploader {
    async fn upload(&self, data: &[u8], file_name: &str, folder: &str) -> Result<UploadResult> {
        let stamp = key::timestamp(&chrono::Local::now());
        let key = self.file_key(folder, file_name, &stamp);
        let stored_name = key.rsplit('/').next().unwrap_or(&key).to_string();

        let mime = mime_guess::from_path(&stored_name).first_or_octet_stream();
        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(stored_name)
            .mime_str(mime.as_ref())
            .map_err(|e| GatewayError::upload("alist", e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .put(self.api("/api/fs/form"))
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .header("File-Path", encode_path(&key))
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| GatewayError::upload("alist", e.to_string()))?;

        let envelope: AlistEnvelope<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| GatewayError::upload("alist", e.to_string()))?;
        if envelope.code != SUCCESS_CODE {
            return Err(GatewayError::upload("alist", envelope.message));
        }

        let url = match self.raw_url(&key).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "direct link lookup failed, using fallback URL");
                self.fallback_url(&key)
            }
        };

        Ok(UploadResult {
            url,
            key,
            size: data.len() as u64,
            file_name: file_name.to_string(),
        })
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Alist
    }
}
