#![warn(missing_docs)]
//! nai-gateway - OpenAI-compatible gateway for NovelAI image generation.
//!
//! Accepts `/v1/chat/completions` and `/v1/images/generations` requests,
//! builds the NovelAI v3 or v4 payload for the requested model, unpacks the
//! returned archive, stores the image through a configured backend and
//! answers with either a streamed chat delta or a DALL·E-style JSON body.
//!
//! # Quick Start
//!
//! ```no_run
//! use nai_gateway::{init_logging, serve, Config};
//!
//! #[tokio::main]
//! async fn main() -> nai_gateway::Result<()> {
//!     let config = Config::from_file(".env")?;
//!     let _guard = init_logging(config.logging_config());
//!     serve(&config).await
//! }
//! ```
//!
//! # Storage backends
//! - `tencent` / `tengxun`: Tencent Cloud COS
//! - `minio`: MinIO or any S3-compatible server
//! - `alist`: self-hosted Alist file manager
//! - `lsky`: Lsky Pro image host
//!
//! # Features
//! - `cli`: the `nai-gateway` binary (default)

pub mod config;
pub mod emitter;
mod error;
pub mod generation;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod protocol;
pub mod reference;
pub mod server;
pub mod storage;
pub mod translation;

// Re-export error types at crate root
pub use error::{GatewayError, Result};

pub use config::{Config, GenerationConfig};
pub use emitter::{EmittedResponse, ImageReference, ResponseEmitter, ResponseSurface};
pub use generation::{
    route_model, CharacterPrompt, ImageProvider, ModelRoute, NormalizedPrompt, NovelAiProvider,
    NovelAiProviderBuilder, ProviderPayload, SchemaVersion,
};
pub use logging::{init_logging, LogGuard, LoggingConfig};
pub use pipeline::{GenerationPipeline, GenerationRequest};
pub use server::{build_app, serve, AppState};
pub use storage::{create_uploader, StorageBackend, UploadResult, Uploader};
pub use translation::Translator;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{GatewayError, Result};
    pub use crate::generation::{ImageProvider, NovelAiProvider, ProviderPayload};
    pub use crate::pipeline::{GenerationPipeline, GenerationRequest};
    pub use crate::storage::Uploader;
    pub use crate::translation::Translator;
}
