//! Provider request bodies for the v3 and v4 schemas.
//!
//! Both builders are pure: the same inputs always serialize to the same
//! document. Configuration values are copied verbatim; the provider is the
//! authority on validation.

use crate::config::GenerationConfig;
use crate::generation::types::{
    CharacterPrompt, Center, ModelRoute, NormalizedPrompt, SchemaVersion,
};
use serde::Serialize;

/// Quality suffix appended to every v3 prompt.
pub const V3_QUALITY_SUFFIX: &str = ",best quality, amazing quality, very aesthetic, absurdres";

/// Quality suffix appended to every v4 prompt.
pub const V4_QUALITY_SUFFIX: &str = ", best quality, very aesthetic, absurdres";

const ACTION_GENERATE: &str = "generate";
const REFERENCE_INFORMATION_EXTRACTED: u32 = 1;
const REFERENCE_STRENGTH: f64 = 0.6;

/// Reference-image fields shared by both schemas.
///
/// The provider accepts several references; exactly one is ever sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceImage {
    reference_image_multiple: Vec<String>,
    reference_information_extracted_multiple: Vec<u32>,
    reference_strength_multiple: Vec<f64>,
}

impl ReferenceImage {
    fn from_base64(image: Option<&str>) -> Option<Self> {
        image.filter(|b| !b.is_empty()).map(|b| Self {
            reference_image_multiple: vec![b.to_string()],
            reference_information_extracted_multiple: vec![REFERENCE_INFORMATION_EXTRACTED],
            reference_strength_multiple: vec![REFERENCE_STRENGTH],
        })
    }
}

/// v3 request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct V3Payload {
    /// Prompt text with quality suffix.
    pub input: String,
    /// Provider model name.
    pub model: String,
    /// Always `generate`.
    pub action: &'static str,
    /// Sampling parameters.
    pub parameters: V3Parameters,
}

/// v3 sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct V3Parameters {
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
    /// Generation seed.
    pub seed: u64,
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
    /// Undesired content.
    pub negative_prompt: String,
    /// Reproduce the old Euler ancestral behaviour.
    pub deliberate_euler_ancestral_bug: bool,
    /// Brownian noise.
    pub prefer_brownian: bool,
    /// Reference image, if the prompt linked one.
    #[serde(flatten)]
    pub reference: Option<ReferenceImage>,
}

/// One entry of a structured caption.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharCaption {
    /// Caption text.
    pub char_caption: String,
    /// Region centers.
    pub centers: Vec<Center>,
}

/// Base caption plus per-region captions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct V4Caption {
    /// Whole-image caption.
    pub base_caption: String,
    /// Per-character captions.
    pub char_captions: Vec<CharCaption>,
}

/// Positive structured prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct V4Prompt {
    /// Caption tree.
    pub caption: V4Caption,
    /// Honour character centers.
    pub use_coords: bool,
    /// Honour character order.
    pub use_order: bool,
}

/// Negative structured prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct V4NegativePrompt {
    /// Caption tree.
    pub caption: V4Caption,
    /// Legacy negative prompt handling.
    pub legacy_uc: bool,
}

/// v4 request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct V4Payload {
    /// Prompt text with quality suffix.
    pub input: String,
    /// Provider model name.
    pub model: String,
    /// Always `generate`.
    pub action: &'static str,
    /// Sampling parameters.
    pub parameters: V4Parameters,
    /// Provider trial flag.
    pub use_new_shared_trial: bool,
    /// Placeholder token.
    pub recaptcha_token: &'static str,
}

/// v4 sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct V4Parameters {
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
    /// Generation seed.
    pub seed: u64,
    /// Images per request.
    pub n_samples: i64,
    /// Undesired-content preset index.
    #[serde(rename = "ucPreset")]
    pub uc_preset: i64,
    /// Provider-side quality tags.
    #[serde(rename = "qualityToggle")]
    pub quality_toggle: bool,
    /// Automatic SMEA.
    #[serde(rename = "autoSmea")]
    pub auto_smea: bool,
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
    /// Honour character centers.
    pub use_coords: bool,
    /// Legacy negative prompt handling.
    pub legacy_uc: bool,
    /// Normalize reference strengths.
    pub normalize_reference_strength_multiple: bool,
    /// Inpainting strength.
    #[serde(rename = "inpaintImg2ImgStrength")]
    pub inpaint_img2img_strength: f64,
    /// Character prompts.
    #[serde(rename = "characterPrompts")]
    pub character_prompts: Vec<CharacterPrompt>,
    /// Positive structured prompt.
    pub v4_prompt: V4Prompt,
    /// Negative structured prompt.
    pub v4_negative_prompt: V4NegativePrompt,
    /// Undesired content.
    pub negative_prompt: String,
    /// Reproduce the old Euler ancestral behaviour.
    pub deliberate_euler_ancestral_bug: bool,
    /// Brownian noise.
    pub prefer_brownian: bool,
    /// Reference image, if the prompt linked one.
    #[serde(flatten)]
    pub reference: Option<ReferenceImage>,
}

/// A provider request body tagged with its schema generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProviderPayload {
    /// Flat v3 document.
    V3(V3Payload),
    /// Structured-caption v4 document.
    V4(V4Payload),
}

impl ProviderPayload {
    /// Builds the payload for a routed model.
    ///
    /// Character prompts are only meaningful for v4 and are ignored for v3.
    pub fn build(
        route: &ModelRoute,
        prompt: &NormalizedPrompt,
        seed: u64,
        config: &GenerationConfig,
        character_prompts: &[CharacterPrompt],
    ) -> Self {
        let reference = prompt.reference_image_base64.as_deref();
        match route.schema {
            SchemaVersion::V3 => {
                Self::V3(build_v3(&route.model, &prompt.text, seed, config, reference))
            }
            SchemaVersion::V4 => Self::V4(build_v4(
                &route.model,
                &prompt.text,
                seed,
                config,
                character_prompts,
                reference,
            )),
        }
    }

    /// Schema generation of this payload.
    pub fn schema(&self) -> SchemaVersion {
        match self {
            Self::V3(_) => SchemaVersion::V3,
            Self::V4(_) => SchemaVersion::V4,
        }
    }

    /// Model identifier carried by the payload.
    pub fn model(&self) -> &str {
        match self {
            Self::V3(p) => &p.model,
            Self::V4(p) => &p.model,
        }
    }

    /// Whether reference-image fields are present.
    pub fn has_reference_image(&self) -> bool {
        match self {
            Self::V3(p) => p.parameters.reference.is_some(),
            Self::V4(p) => p.parameters.reference.is_some(),
        }
    }
}

/// Builds a v3 payload.
pub fn build_v3(
    model: &str,
    prompt: &str,
    seed: u64,
    config: &GenerationConfig,
    reference_image_base64: Option<&str>,
) -> V3Payload {
    V3Payload {
        input: format!("{}{}", prompt, V3_QUALITY_SUFFIX),
        model: model.to_string(),
        action: ACTION_GENERATE,
        parameters: V3Parameters {
            params_version: config.params_version,
            width: config.width,
            height: config.height,
            scale: config.scale,
            sampler: config.sampler.clone(),
            steps: config.steps,
            seed,
            n_samples: config.n_samples,
            uc_preset: config.uc_preset,
            quality_toggle: config.quality_toggle,
            sm: config.sm,
            sm_dyn: config.sm_dyn,
            dynamic_thresholding: config.dynamic_thresholding,
            controlnet_strength: config.controlnet_strength,
            legacy: config.legacy,
            add_original_image: config.add_original_image,
            cfg_rescale: config.cfg_rescale,
            noise_schedule: config.noise_schedule.clone(),
            legacy_v3_extend: config.legacy_v3_extend,
            skip_cfg_above_sigma: config.skip_cfg_above_sigma,
            negative_prompt: config.custom_anti_words.clone(),
            deliberate_euler_ancestral_bug: config.deliberate_euler_ancestral_bug,
            prefer_brownian: config.prefer_brownian,
            reference: ReferenceImage::from_base64(reference_image_base64),
        },
    }
}

/// Builds a v4 payload.
///
/// With no character prompts a single default region is synthesized at the
/// origin. Disabled prompts are dropped from both captions and from the
/// character list itself.
pub fn build_v4(
    model: &str,
    prompt: &str,
    seed: u64,
    config: &GenerationConfig,
    character_prompts: &[CharacterPrompt],
    reference_image_base64: Option<&str>,
) -> V4Payload {
    let input = format!("{}{}", prompt, V4_QUALITY_SUFFIX);

    let characters: Vec<CharacterPrompt> = if character_prompts.is_empty() {
        vec![CharacterPrompt {
            prompt: input.clone(),
            uc: config.custom_anti_words.clone(),
            center: Center::ORIGIN,
            enabled: true,
        }]
    } else {
        character_prompts
            .iter()
            .filter(|cp| cp.enabled)
            .cloned()
            .collect()
    };

    let captions = |text: fn(&CharacterPrompt) -> &str| -> Vec<CharCaption> {
        characters
            .iter()
            .map(|cp| CharCaption {
                char_caption: text(cp).to_string(),
                centers: vec![cp.center],
            })
            .collect()
    };

    let v4_prompt = V4Prompt {
        caption: V4Caption {
            base_caption: input.clone(),
            char_captions: captions(|cp| cp.prompt.as_str()),
        },
        use_coords: config.use_coords,
        use_order: true,
    };

    let v4_negative_prompt = V4NegativePrompt {
        caption: V4Caption {
            base_caption: config.custom_anti_words.clone(),
            char_captions: captions(|cp| cp.uc.as_str()),
        },
        legacy_uc: config.legacy_uc,
    };

    V4Payload {
        input,
        model: model.to_string(),
        action: ACTION_GENERATE,
        parameters: V4Parameters {
            params_version: config.params_version,
            width: config.width,
            height: config.height,
            scale: config.scale,
            sampler: config.sampler.clone(),
            steps: config.steps,
            seed,
            n_samples: config.n_samples,
            uc_preset: config.uc_preset,
            quality_toggle: config.quality_toggle,
            auto_smea: config.auto_smea,
            dynamic_thresholding: config.dynamic_thresholding,
            controlnet_strength: config.controlnet_strength,
            legacy: config.legacy,
            add_original_image: config.add_original_image,
            cfg_rescale: config.cfg_rescale,
            noise_schedule: config.noise_schedule.clone(),
            legacy_v3_extend: config.legacy_v3_extend,
            skip_cfg_above_sigma: config.skip_cfg_above_sigma,
            use_coords: config.use_coords,
            legacy_uc: config.legacy_uc,
            normalize_reference_strength_multiple: config.normalize_reference_strength_multiple,
            inpaint_img2img_strength: config.inpaint_img2img_strength,
            character_prompts: characters,
            v4_prompt,
            v4_negative_prompt,
            negative_prompt: config.custom_anti_words.clone(),
            deliberate_euler_ancestral_bug: config.deliberate_euler_ancestral_bug,
            prefer_brownian: config.prefer_brownian,
            reference: ReferenceImage::from_base64(reference_image_base64),
        },
        use_new_shared_trial: config.use_new_shared_trial,
        recaptcha_token: " ",
    }
}
