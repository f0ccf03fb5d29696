//! Reference images linked from a prompt.

use crate::error::{GatewayError, Result};
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

static LINK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+").expect("link pattern is valid"));

/// First `http(s)://` link in `text`, up to the next whitespace.
pub fn extract_first_link(text: &str) -> Option<&str> {
    LINK_PATTERN.find(text).map(|m| m.as_str())
}

/// Downloads `url` and returns its body base64-encoded.
pub async fn fetch_base64(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(GatewayError::Api {
            status: status.as_u16(),
            message: format!("reference image download failed: {}", url),
        });
    }
    let bytes = response.bytes().await?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&bytes))
}

/// Resolves the reference image for a prompt, if it links one.
///
/// A failed download means no reference image; the request goes on.
pub async fn resolve_reference(client: &reqwest::Client, text: &str) -> Option<String> {
    let url = extract_first_link(text)?;
    match fetch_base64(client, url).await {
        Ok(encoded) => {
            tracing::debug!(url = %url, encoded_len = encoded.len(), "reference image fetched");
            Some(encoded)
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "reference image unavailable");
            None
        }
    }
}
