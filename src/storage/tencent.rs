//! Tencent Cloud COS backend.

use crate::config::TencentCosConfig;
use crate::error::{truncate_for_diagnostics, GatewayError, Result};
use crate::storage::key::{self, DEFAULT_ROOT};
use crate::storage::signing::{cos_authorization, host_header};
use crate::storage::{StorageBackend, UploadResult, Uploader};
use async_trait::async_trait;
use url::Url;

/// Validity window of a request signature, in seconds.
const SIGNATURE_TTL_SECS: i64 = 600;

/// Uploads through the COS REST API with a signed `PUT`.
#[derive(Debug, Clone)]
pub struct TencentCosUploader {
    client: reqwest::Client,
    config: TencentCosConfig,
    bucket_url: Url,
}

impl TencentCosUploader {
    /// Creates the uploader. The bucket URL is derived from bucket and region
    /// unless `endpoint` overrides it.
    pub fn new(client: reqwest::Client, config: TencentCosConfig) -> Result<Self> {
        let endpoint = match config.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(endpoint) => endpoint.to_string(),
            None => {
                if config.bucket.is_empty() || config.region.is_empty() {
                    return Err(GatewayError::Config(
                        "tencent_cos requires bucket and region".into(),
                    ));
                }
                format!("https://{}.cos.{}.myqcloud.com", config.bucket, config.region)
            }
        };
        let bucket_url = Url::parse(&endpoint)
            .map_err(|e| GatewayError::Config(format!("invalid COS URL {}: {}", endpoint, e)))?;
        tracing::info!(bucket_url = %bucket_url, "Tencent COS uploader ready");

        Ok(Self {
            client,
            config,
            bucket_url,
        })
    }

    fn public_url(&self, key: &str) -> String {
        key::join_url(&self.config.base_url, key)
    }
}

#[async_trait]
impl Uploader for TencentCosUploader {
    async fn upload(&self, data: &[u8], file_name: &str, folder: &str) -> Result<UploadResult> {
        let now = chrono::Local::now();
        let key = key::object_key(folder, file_name, &key::timestamp(&now), DEFAULT_ROOT);

        let url = self
            .bucket_url
            .join(&key)
            .map_err(|e| GatewayError::upload("tencent", e.to_string()))?;
        let start = now.timestamp();
        let authorization = cos_authorization(
            &self.config.secret_id,
            &self.config.secret_key,
            "PUT",
            url.path(),
            &host_header(&url),
            start,
            start + SIGNATURE_TTL_SECS,
        );
        let content_type = mime_guess::from_path(file_name).first_or_octet_stream();

        let response = self
            .client
            .put(url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(reqwest::header::CONTENT_TYPE, content_type.as_ref())
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| GatewayError::upload("tencent", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::upload(
                "tencent",
                format!("status {}: {}", status.as_u16(), truncate_for_diagnostics(&text)),
            ));
        }

        Ok(UploadResult {
            url: self.public_url(&key),
            key,
            size: data.len() as u64,
            file_name: file_name.to_string(),
        })
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Tencent
    }
}
