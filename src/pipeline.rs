//! One generation request, end to end.
//!
//! Stages run strictly in order on the caller's task: normalize, build the
//! payload, call the provider, extract the image, upload, emit.

use crate::config::GenerationConfig;
use crate::emitter::{EmittedResponse, ResponseEmitter, ResponseSurface};
use crate::error::Result;
use crate::generation::{
    extract_image, route_model, CharacterPrompt, ImageProvider, ProviderPayload,
};
use crate::logging::mask_secret;
use crate::normalize::RequestNormalizer;
use crate::storage::Uploader;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Exclusive upper bound of generated seeds.
pub const SEED_RANGE: u64 = 1_000_000;

/// A request after it has been decoded from either public surface.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Surface that accepted the request; fixes the response shape.
    pub surface: ResponseSurface,
    /// Model name as sent by the caller.
    pub model: String,
    /// Raw prompt text.
    pub prompt: String,
    /// Per-region prompts; only used by v4 models.
    pub character_prompts: Vec<CharacterPrompt>,
    /// Bearer token forwarded to the provider.
    pub bearer_token: String,
}

impl GenerationRequest {
    /// Creates a request with no character prompts.
    pub fn new(
        surface: ResponseSurface,
        model: impl Into<String>,
        prompt: impl Into<String>,
        bearer_token: impl Into<String>,
    ) -> Self {
        Self {
            surface,
            model: model.into(),
            prompt: prompt.into(),
            character_prompts: Vec::new(),
            bearer_token: bearer_token.into(),
        }
    }

    /// Sets the character prompts.
    pub fn with_character_prompts(mut self, prompts: Vec<CharacterPrompt>) -> Self {
        self.character_prompts = prompts;
        self
    }
}

/// Draws a seed from an RNG seeded with the wall-clock time.
///
/// Two requests within the same clock tick may draw the same seed.
pub fn draw_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    StdRng::seed_from_u64(nanos).random_range(0..SEED_RANGE)
}

/// Shared, read-only collaborators of every request.
#[derive(Clone)]
pub struct GenerationPipeline {
    provider: Arc<dyn ImageProvider>,
    uploader: Arc<dyn Uploader>,
    normalizer: RequestNormalizer,
    parameters: Arc<GenerationConfig>,
    upload_folder: String,
}

impl GenerationPipeline {
    /// Wires the pipeline.
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        uploader: Arc<dyn Uploader>,
        normalizer: RequestNormalizer,
        parameters: GenerationConfig,
        upload_folder: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            uploader,
            normalizer,
            parameters: Arc::new(parameters),
            upload_folder: upload_folder.into(),
        }
    }

    /// The generation provider.
    pub fn provider(&self) -> &dyn ImageProvider {
        self.provider.as_ref()
    }

    /// The storage backend.
    pub fn uploader(&self) -> &dyn Uploader {
        self.uploader.as_ref()
    }

    /// Runs one request.
    ///
    /// Decode, provider and archive failures abort with an error. Upload
    /// failures do not: the response carries the failure sentinel instead.
    pub async fn run(&self, request: GenerationRequest) -> Result<EmittedResponse> {
        let started = Instant::now();
        let route = route_model(&request.model);
        let seed = draw_seed();
        tracing::info!(
            surface = ?request.surface,
            requested = %request.model,
            model = %route.model,
            schema = %route.schema,
            seed,
            token = %mask_secret(&request.bearer_token),
            "generation request"
        );

        let prompt = self.normalizer.normalize(&request.prompt).await;
        let payload = ProviderPayload::build(
            &route,
            &prompt,
            seed,
            &self.parameters,
            &request.character_prompts,
        );
        tracing::debug!(
            model = %payload.model(),
            reference = payload.has_reference_image(),
            "payload built"
        );

        let body = self.provider.generate(&payload, &request.bearer_token).await?;
        let image = extract_image(&body)?;

        let created = chrono::Utc::now().timestamp();
        let file_name = route.image_name(created);
        let mut emitter = ResponseEmitter::new(request.surface, request.model, created);
        let reference = emitter
            .upload(self.uploader.as_ref(), &image, &file_name, &self.upload_folder)
            .await;
        let response = emitter.emit(&file_name, &reference)?;

        tracing::info!(
            file = %file_name,
            stored = reference.is_url(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generation complete"
        );
        Ok(response)
    }
}

impl std::fmt::Debug for GenerationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationPipeline")
            .field("provider", &self.provider.name())
            .field("storage", &self.uploader.backend())
            .field("normalizer", &self.normalizer)
            .field("upload_folder", &self.upload_folder)
            .finish()
    }
}
