//! Pluggable object storage for generated images.
//!
//! A single [`Uploader`] capability with one implementation per backend. The
//! backend is chosen once at startup by [`create_uploader`]; request handling
//! only ever sees `Arc<dyn Uploader>`.

mod alist;
pub mod key;
mod lsky;
mod minio;
pub mod signing;
mod tencent;

pub use alist::AlistUploader;
pub use lsky::LskyUploader;
pub use minio::MinioUploader;
pub use tencent::TencentCosUploader;

use crate::config::Config;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

/// A successfully stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    /// Publicly resolvable URL.
    pub url: String,
    /// Backend object key or path.
    pub key: String,
    /// Stored size in bytes.
    pub size: u64,
    /// File name as requested by the caller.
    #[serde(rename = "filename")]
    pub file_name: String,
}

/// Storage capability.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Stores `data` under a timestamped key derived from `file_name` and
    /// `folder`. One attempt, no retry.
    async fn upload(&self, data: &[u8], file_name: &str, folder: &str) -> Result<UploadResult>;

    /// Which backend this is.
    fn backend(&self) -> StorageBackend;
}

/// Storage backend identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Tencent Cloud COS (`tencent` or `tengxun`).
    Tencent,
    /// MinIO or another S3-compatible server.
    Minio,
    /// Self-hosted Alist file manager.
    Alist,
    /// Lsky Pro image host.
    Lsky,
}

impl StorageBackend {
    /// Canonical identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tencent => "tencent",
            Self::Minio => "minio",
            Self::Alist => "alist",
            Self::Lsky => "lsky",
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tencent" | "tengxun" => Ok(Self::Tencent),
            "minio" => Ok(Self::Minio),
            "alist" => Ok(Self::Alist),
            "lsky" => Ok(Self::Lsky),
            _ => Err(GatewayError::Config(format!(
                "unsupported storage backend {:?} (expected tencent, tengxun, minio, alist or lsky)",
                s
            ))),
        }
    }
}

/// Builds the configured uploader.
///
/// Fails on an unknown backend identifier or when the backend's own settings
/// are incomplete. Alist may perform its login request here.
pub async fn create_uploader(config: &Config, client: reqwest::Client) -> Result<Arc<dyn Uploader>> {
    let backend: StorageBackend = config.cos.bucket.parse()?;
    tracing::info!(backend = %backend, "creating storage uploader");

    let uploader: Arc<dyn Uploader> = match backend {
        StorageBackend::Tencent => Arc::new(TencentCosUploader::new(
            client,
            config.tencent_cos.clone(),
        )?),
        StorageBackend::Minio => Arc::new(MinioUploader::new(client, config.minio.clone())?),
        StorageBackend::Alist => {
            Arc::new(AlistUploader::connect(client, config.alist.clone()).await?)
        }
        StorageBackend::Lsky => Arc::new(LskyUploader::new(client, config.lsky.clone())?),
    };
    Ok(uploader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_identifiers() {
        assert_eq!("tencent".parse::<StorageBackend>().unwrap(), StorageBackend::Tencent);
        assert_eq!("Tengxun".parse::<StorageBackend>().unwrap(), StorageBackend::Tencent);
        assert_eq!(" MINIO ".parse::<StorageBackend>().unwrap(), StorageBackend::Minio);
        assert_eq!("alist".parse::<StorageBackend>().unwrap(), StorageBackend::Alist);
        assert_eq!("lsky".parse::<StorageBackend>().unwrap(), StorageBackend::Lsky);
    }

    #[test]
    fn test_parse_unknown_backend() {
        for id in ["", "s3", "oss", "aliyun"] {
            assert!(matches!(
                id.parse::<StorageBackend>(),
                Err(GatewayError::Config(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_create_uploader_unknown_backend_fails() {
        let mut config = Config::default();
        config.cos.bucket = "dropbox".into();
        assert!(create_uploader(&config, reqwest::Client::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_create_uploader_selects_backend() {
        let mut config = Config::default();
        config.cos.bucket = "lsky".into();
        config.lsky.base_url = "https://img.example.com".into();
        config.lsky.token = "token".into();
        let uploader = create_uploader(&config, reqwest::Client::new()).await.unwrap();
        assert_eq!(uploader.backend(), StorageBackend::Lsky);

        config.cos.bucket = "tengxun".into();
        config.tencent_cos.bucket = "b-125".into();
        config.tencent_cos.region = "ap-guangzhou".into();
        let uploader = create_uploader(&config, reqwest::Client::new()).await.unwrap();
        assert_eq!(uploader.backend(), StorageBackend::Tencent);
    }

    #[test]
    fn test_upload_result_serializes_filename() {
        let result = UploadResult {
            url: "u".into(),
            key: "k".into(),
            size: 3,
            file_name: "f.png".into(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["filename"], "f.png");
    }
}
