//! Process configuration.
//!
//! The gateway reads a single YAML document at startup. The document is
//! shared read-only by every request afterwards.

use crate::error::{GatewayError, Result};
use crate::logging::LoggingConfig;
use serde::Deserialize;
use std::path::Path;

/// Folder segment under which generated images are stored.
pub const DEFAULT_UPLOAD_FOLDER: &str = "nai-images";

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings.
    pub server: ServerSection,
    /// Storage backend selector.
    pub cos: StorageSelector,
    /// Prompt translation collaborator.
    pub translation: TranslationConfig,
    /// Tencent COS backend settings.
    pub tencent_cos: TencentCosConfig,
    /// MinIO / S3-compatible backend settings.
    pub minio: MinioConfig,
    /// Alist backend settings.
    pub alist: AlistConfig,
    /// Lsky Pro image host settings.
    pub lsky: LskyConfig,
    /// Sampler, size and quality parameters forwarded to the provider.
    pub parameters: GenerationConfig,
    /// Generation endpoint override.
    pub provider: ProviderSection,
    /// Folder segment for uploaded images.
    pub upload_folder: Option<String>,
    /// Logging settings.
    pub logging: LoggingSection,
}

impl Config {
    /// Reads and parses the YAML configuration file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&raw)
    }

    /// Parses a configuration document.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Folder segment used for every stored image.
    pub fn upload_folder(&self) -> &str {
        self.upload_folder
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_UPLOAD_FOLDER)
    }

    /// Socket address the server binds to.
    ///
    /// A bare port (the historical format of `server.addr`) binds all interfaces.
    pub fn bind_addr(&self) -> String {
        let addr = self.server.addr.trim();
        if addr.is_empty() {
            "0.0.0.0:8080".to_string()
        } else if addr.contains(':') {
            addr.to_string()
        } else {
            format!("0.0.0.0:{}", addr)
        }
    }

    /// Builds the logging configuration from the `logging` section.
    pub fn logging_config(&self) -> LoggingConfig {
        let mut config = LoggingConfig::default();
        if let Some(level) = self
            .logging
            .level
            .as_deref()
            .and_then(|l| l.to_uppercase().parse().ok())
        {
            config.level = level;
        }
        config.json_format = self.logging.json;
        config.log_dir = self.logging.dir.clone();
        config
    }
}

/// `server` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Port or `host:port`.
    pub addr: String,
}

/// `cos` section: which storage backend handles uploads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSelector {
    /// Backend identifier (`tencent`, `tengxun`, `minio`, `alist`, `lsky`).
    #[serde(alias = "backet")]
    pub bucket: String,
}

/// `provider` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    /// Overrides the generation endpoint URL.
    pub base_url: Option<String>,
}

/// `logging` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level name (`trace` .. `error`).
    pub level: Option<String>,
    /// Emit JSON formatted log lines.
    pub json: bool,
    /// Directory for daily-rolling log files.
    pub dir: Option<String>,
}

/// Translation collaborator settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Base URL of an OpenAI-compatible chat endpoint.
    pub url: String,
    /// Bearer key for the translation endpoint.
    pub key: String,
    /// Chat model used for translation.
    pub model: String,
    /// System prompt describing the translation task.
    pub role: String,
    /// Whether prompts are translated before generation.
    pub enable: bool,
}

/// Tencent COS settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TencentCosConfig {
    /// SecretId of the signing credential.
    pub secret_id: String,
    /// SecretKey of the signing credential.
    pub secret_key: String,
    /// Bucket region, e.g. `ap-shanghai`.
    pub region: String,
    /// Bucket name including the app id suffix.
    pub bucket: String,
    /// Public URL prefix for stored objects.
    pub base_url: String,
    /// Overrides the derived `https://{bucket}.cos.{region}.myqcloud.com` endpoint.
    pub endpoint: Option<String>,
}

/// MinIO / S3-compatible settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MinioConfig {
    /// Server endpoint, with or without scheme.
    pub endpoint: String,
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Target bucket, created on demand.
    pub bucket_name: String,
    /// Use HTTPS when talking to the endpoint.
    pub use_ssl: bool,
    /// Public URL prefix; falls back to the endpoint.
    pub base_url: String,
    /// Signing region.
    pub region: Option<String>,
}

/// Alist file manager settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlistConfig {
    /// Alist server URL.
    pub base_url: String,
    /// Pre-issued token; when empty, username/password login is used.
    pub token: String,
    /// Root path for uploads.
    pub path: String,
    /// Login username.
    pub username: String,
    /// Login password.
    pub password: String,
}

/// Lsky Pro image host settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LskyConfig {
    /// Lsky Pro server URL.
    pub base_url: String,
    /// API token.
    pub token: String,
    /// Storage strategy id; `0` leaves the choice to the server.
    pub strategy_id: u32,
}

/// Static generation parameters shared by every request.
///
/// Values are forwarded verbatim; the provider is the authority on validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Parameter schema revision.
    pub params_version: i64,
    /// Image width in pixels.
    pub width: i64,
    /// Image height in pixels.
    pub height: i64,
    /// Prompt guidance scale.
    pub scale: f64,
    /// Sampler name, e.g. `k_euler_ancestral`.
    pub sampler: String,
    /// Sampling steps.
    pub steps: i64,
    /// Images per request.
    pub n_samples: i64,
    /// Undesired-content preset index.
    #[serde(rename = "ucPreset")]
    pub uc_preset: i64,
    /// Provider-side quality tags.
    #[serde(rename = "qualityToggle")]
    pub quality_toggle: bool,
    /// SMEA sampling.
    pub sm: bool,
    /// Dynamic SMEA.
    pub sm_dyn: bool,
    /// Decrisp.
    pub dynamic_thresholding: bool,
    /// Control strength.
    pub controlnet_strength: f64,
    /// Legacy prompt handling.
    pub legacy: bool,
    /// Blend the original image back in.
    pub add_original_image: bool,
    /// Guidance rescale.
    pub cfg_rescale: f64,
    /// Noise schedule name.
    pub noise_schedule: String,
    /// Legacy v3 prompt extension.
    pub legacy_v3_extend: bool,
    /// Sigma above which guidance is skipped.
    pub skip_cfg_above_sigma: Option<f64>,
    /// Reproduce the old Euler ancestral behaviour.
    pub deliberate_euler_ancestral_bug: bool,
    /// Brownian noise.
    pub prefer_brownian: bool,
    /// Global negative prompt.
    pub custom_anti_words: String,
    /// Automatic SMEA.
    #[serde(rename = "autoSmea")]
    pub auto_smea: bool,
    /// Honour character centers.
    pub use_coords: bool,
    /// Legacy negative prompt handling.
    pub legacy_uc: bool,
    /// Normalize reference strengths.
    pub normalize_reference_strength_multiple: bool,
    /// Inpainting strength.
    #[serde(rename = "inpaintImg2ImgStrength")]
    pub inpaint_img2img_strength: f64,
    /// Provider trial flag.
    pub use_new_shared_trial: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            params_version: 3,
            width: 832,
            height: 1216,
            scale: 5.0,
            sampler: "k_euler_ancestral".to_string(),
            steps: 28,
            n_samples: 1,
            uc_preset: 0,
            quality_toggle: true,
            sm: false,
            sm_dyn: false,
            dynamic_thresholding: false,
            controlnet_strength: 1.0,
            legacy: false,
            add_original_image: true,
            cfg_rescale: 0.0,
            noise_schedule: "karras".to_string(),
            legacy_v3_extend: false,
            skip_cfg_above_sigma: None,
            deliberate_euler_ancestral_bug: false,
            prefer_brownian: true,
            custom_anti_words: String::new(),
            auto_smea: false,
            use_coords: false,
            legacy_uc: false,
            normalize_reference_strength_multiple: true,
            inpaint_img2img_strength: 1.0,
            use_new_shared_trial: true,
        }
    }
}
