//! MinIO / S3-compatible backend.

use crate::config::MinioConfig;
use crate::error::{truncate_for_diagnostics, GatewayError, Result};
use crate::storage::key::{self, DEFAULT_ROOT};
use crate::storage::signing::{sha256_hex, SigV4};
use crate::storage::{StorageBackend, UploadResult, Uploader};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use url::Url;

const DEFAULT_REGION: &str = "us-east-1";

/// Uploads with path-style S3 requests signed with Signature V4.
#[derive(Debug, Clone)]
pub struct MinioUploader {
    client: reqwest::Client,
    config: MinioConfig,
    /// Endpoint without scheme.
    host: String,
    server_url: Url,
}

impl MinioUploader {
    /// Creates the uploader. Any scheme on the configured endpoint is replaced
    /// by the one implied by `use_ssl`.
    pub fn new(client: reqwest::Client, config: MinioConfig) -> Result<Self> {
        let host = config
            .endpoint
            .trim()
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .trim_end_matches('/')
            .to_string();
        if host.is_empty() {
            return Err(GatewayError::Config("minio.endpoint is required".into()));
        }
        if config.bucket_name.trim().is_empty() {
            return Err(GatewayError::Config("minio.bucket_name is required".into()));
        }

        let server_url = Url::parse(&format!("{}://{}/", scheme(config.use_ssl), host))
            .map_err(|e| GatewayError::Config(format!("invalid minio endpoint {}: {}", host, e)))?;
        tracing::info!(endpoint = %host, use_ssl = config.use_ssl, "MinIO uploader ready");

        Ok(Self {
            client,
            config,
            host,
            server_url,
        })
    }

    fn region(&self) -> &str {
        self.config
            .region
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REGION)
    }

    fn signer(&self) -> SigV4<'_> {
        SigV4 {
            access_key: &self.config.access_key_id,
            secret_key: &self.config.secret_access_key,
            region: self.region(),
            service: "s3",
        }
    }

    fn bucket_url(&self) -> Result<Url> {
        self.server_url
            .join(&self.config.bucket_name)
            .map_err(|e| GatewayError::upload("minio", e.to_string()))
    }

    fn object_url(&self, key: &str) -> Result<Url> {
        self.server_url
            .join(&format!("{}/{}", self.config.bucket_name, key))
            .map_err(|e| GatewayError::upload("minio", e.to_string()))
    }

    /// Public URL of a stored object.
    pub fn public_url(&self, key: &str) -> String {
        let base = if self.config.base_url.trim().is_empty() {
            format!("{}://{}", scheme(self.config.use_ssl), self.host)
        } else {
            self.config.base_url.clone()
        };
        key::join_url(&base, &format!("{}/{}", self.config.bucket_name, key))
    }

    async fn send_signed(
        &self,
        method: Method,
        url: Url,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response> {
        let signed = self.signer().sign(
            method.as_str(),
            &url,
            &[],
            &sha256_hex(&body),
            chrono::Utc::now(),
        );

        let mut request = self
            .client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, signed.authorization)
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.content_sha256);
        if let Some(content_type) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        request
            .send()
            .await
            .map_err(|e| GatewayError::upload("minio", e.to_string()))
    }

    /// Creates the bucket if it does not exist yet.
    async fn ensure_bucket(&self) -> Result<()> {
        let response = self
            .send_signed(Method::HEAD, self.bucket_url()?, Vec::new(), None)
            .await?;
        match response.status() {
            s if s.is_success() => return Ok(()),
            StatusCode::NOT_FOUND => {}
            s => {
                return Err(GatewayError::upload(
                    "minio",
                    format!("bucket check failed with status {}", s.as_u16()),
                ))
            }
        }

        let response = self
            .send_signed(Method::PUT, self.bucket_url()?, Vec::new(), None)
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::upload(
                "minio",
                format!(
                    "bucket creation failed with status {}: {}",
                    status.as_u16(),
                    truncate_for_diagnostics(&text)
                ),
            ));
        }
        tracing::info!(bucket = %self.config.bucket_name, "bucket created");
        Ok(())
    }
}

fn scheme(use_ssl: bool) -> &'static str {
    if use_ssl {
        "https"
    } else {
        "http"
    }
}

#[async_trait]
impl Uploader for MinioUploader {
    async fn upload(&self, data: &[u8], file_name: &str, folder: &str) -> Result<UploadResult> {
        let stamp = key::timestamp(&chrono::Local::now());
        let key = key::object_key(folder, file_name, &stamp, DEFAULT_ROOT);

        self.ensure_bucket().await?;

        let content_type = mime_guess::from_path(file_name).first_or_octet_stream();
        let response = self
            .send_signed(
                Method::PUT,
                self.object_url(&key)?,
                data.to_vec(),
                Some(content_type.as_ref()),
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::upload(
                "minio",
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
        StorageBackend::Minio
    }
}
