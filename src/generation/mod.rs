//! Image generation: routing, payload construction, provider client and
//! archive extraction.

pub mod archive;
pub mod payload;
mod provider;
mod types;

pub use archive::{extract_image, IMAGE_ENTRY_NAME};
pub use payload::{build_v3, build_v4, ProviderPayload, V3_QUALITY_SUFFIX, V4_QUALITY_SUFFIX};
pub use provider::{ImageProvider, NovelAiProvider, NovelAiProviderBuilder, NOVELAI_GENERATE_URL};
pub use types::{
    route_model, supported_models, Center, CharacterPrompt, ModelRoute, NormalizedPrompt,
    SchemaVersion, FALLBACK_MODEL, V3_MODELS, V4_MODELS,
};
