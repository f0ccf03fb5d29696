//! Error types for the generation gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Maximum number of characters of an upstream body kept in diagnostics.
const MAX_DIAGNOSTIC_CHARS: usize = 512;

/// Errors that can occur while serving a generation request.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The inbound request body could not be decoded.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The generation provider answered with a non-success status.
    #[error("API request failed with status {status}: {message}")]
    Api {
        /// Upstream HTTP status.
        status: u16,
        /// Truncated upstream body.
        message: String,
    },

    /// Network or HTTP transport error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider body is shorter than the smallest possible archive.
    #[error("response too short to be an archive: {0} bytes")]
    ArchiveTooShort(usize),

    /// Provider body does not start with the archive signature.
    #[error("response is not an archive")]
    NotAnArchive,

    /// Provider body has the archive signature but could not be read.
    #[error("failed to read archive: {0}")]
    MalformedArchive(String),

    /// The archive did not contain the expected image entry.
    #[error("upstream returned no image (missing entry {0})")]
    MissingImage(String),

    /// A storage backend rejected or failed an upload.
    #[error("{backend} upload failed: {message}")]
    Upload {
        /// Backend name.
        backend: &'static str,
        /// Backend error.
        message: String,
    },

    /// Translation collaborator failed.
    #[error("translation failed: {0}")]
    Translation(String),

    /// An operation was attempted out of its lifecycle order.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Configuration is missing or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error (e.g., reading the configuration file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl GatewayError {
    /// Convenience constructor for upload failures.
    pub fn upload(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Upload {
            backend,
            message: message.into(),
        }
    }

    /// HTTP status reported to the caller when this error aborts a request.
    ///
    /// Upstream API failures keep the provider's own status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::Json(_) => StatusCode::BAD_REQUEST,
            Self::Api { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Network(_) | Self::MissingImage(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code used in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) | Self::Json(_) => "invalid_request",
            Self::Api { .. } => "upstream_error",
            Self::Network(_) => "upstream_unreachable",
            Self::ArchiveTooShort(_) => "invalid_upstream_response",
            Self::NotAnArchive => "upstream_not_archive",
            Self::MalformedArchive(_) => "upstream_archive_unreadable",
            Self::MissingImage(_) => "upstream_no_image",
            Self::Upload { .. } => "upload_failed",
            Self::Translation(_) => "translation_failed",
            Self::InvalidState(_) => "internal_error",
            Self::Config(_) | Self::Yaml(_) => "configuration_error",
            Self::Io(_) => "io_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "error": {
                "message": self.to_string(),
                "type": if status.is_client_error() { "invalid_request_error" } else { "server_error" },
                "code": self.code(),
            }
        });
        (status, Json(body)).into_response()
    }
}

/// Truncates an upstream body for logs and error messages.
pub fn truncate_for_diagnostics(text: &str) -> String {
    if text.chars().count() <= MAX_DIAGNOSTIC_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_DIAGNOSTIC_CHARS).collect();
    out.push_str("...");
    out
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
