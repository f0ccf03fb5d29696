//! Core types for a single generation request.

use serde::{Deserialize, Serialize};

/// Fallback model used when the requested model is not recognized.
pub const FALLBACK_MODEL: &str = "nai-diffusion-3";

/// Models accepted by the v3 payload schema.
pub const V3_MODELS: &[&str] = &["nai-diffusion-3", "nai-diffusion-furry-3"];

/// Models accepted by the v4 payload schema.
pub const V4_MODELS: &[&str] = &[
    "nai-diffusion-4-full",
    "nai-diffusion-4-curated-preview",
    "nai-diffusion-4-5-curated",
    "nai-diffusion-4-5-full",
];

/// Prompt text after normalization, translation and reference extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPrompt {
    /// Prompt text sent to the provider (before the quality suffix).
    pub text: String,
    /// Base64-encoded reference image, if the prompt linked one.
    pub reference_image_base64: Option<String>,
}

impl NormalizedPrompt {
    /// Creates a prompt without a reference image.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reference_image_base64: None,
        }
    }

    /// Attaches a base64-encoded reference image.
    pub fn with_reference_image(mut self, base64: impl Into<String>) -> Self {
        self.reference_image_base64 = Some(base64.into());
        self
    }
}

/// Normalized position of a character region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Center {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Center {
    /// The origin coordinate.
    pub const ORIGIN: Center = Center { x: 0.0, y: 0.0 };
}

/// A per-region prompt for v4 models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterPrompt {
    /// Positive prompt for this region.
    pub prompt: String,
    /// Negative prompt for this region.
    #[serde(default)]
    pub uc: String,
    /// Region center.
    #[serde(default)]
    pub center: Center,
    /// Disabled prompts are dropped from the payload entirely.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Provider payload schema generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// Flat parameters with a single prompt string.
    V3,
    /// Structured multi-region captions.
    V4,
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V3 => write!(f, "v3"),
            Self::V4 => write!(f, "v4"),
        }
    }
}

/// Result of routing a requested model name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRoute {
    /// Model identifier sent to the provider.
    pub model: String,
    /// Payload schema for that model.
    pub schema: SchemaVersion,
}

impl ModelRoute {
    /// File name for the stored image, derived from the schema and a unix timestamp.
    pub fn image_name(&self, unix_ts: i64) -> String {
        match self.schema {
            SchemaVersion::V3 => format!("{}.png", unix_ts),
            SchemaVersion::V4 => format!("nai4_{}.png", unix_ts),
        }
    }
}

/// Maps a requested model name to the provider model and payload schema.
///
/// Matching is exact and case-sensitive. Anything unrecognized is sent to
/// [`FALLBACK_MODEL`] with the v3 schema.
pub fn route_model(requested: &str) -> ModelRoute {
    if V4_MODELS.contains(&requested) {
        ModelRoute {
            model: requested.to_string(),
            schema: SchemaVersion::V4,
        }
    } else if V3_MODELS.contains(&requested) {
        ModelRoute {
            model: requested.to_string(),
            schema: SchemaVersion::V3,
        }
    } else {
        ModelRoute {
            model: FALLBACK_MODEL.to_string(),
            schema: SchemaVersion::V3,
        }
    }
}

/// All routable models with their schema, in table order.
pub fn supported_models() -> Vec<ModelRoute> {
    V3_MODELS
        .iter()
        .chain(V4_MODELS.iter())
        .map(|m| route_model(m))
        .collect()
}
