//! Turns raw prompt text into a [`NormalizedPrompt`].

use crate::generation::NormalizedPrompt;
use crate::reference::resolve_reference;
use crate::translation::{translate_or_original, Translator};
use std::sync::Arc;

/// Applies optional translation and reference-image resolution to a prompt.
#[derive(Clone)]
pub struct RequestNormalizer {
    translator: Option<Arc<dyn Translator>>,
    client: reqwest::Client,
}

impl RequestNormalizer {
    /// Creates a normalizer; `None` disables translation.
    pub fn new(translator: Option<Arc<dyn Translator>>, client: reqwest::Client) -> Self {
        Self { translator, client }
    }

    /// Whether prompts are translated.
    pub fn translates(&self) -> bool {
        self.translator.is_some()
    }

    /// Normalizes `raw`.
    ///
    /// Translation never fails the request, and neither does a reference
    /// link that cannot be downloaded. The link is looked up in the
    /// translated text.
    pub async fn normalize(&self, raw: &str) -> NormalizedPrompt {
        let text = match &self.translator {
            Some(translator) => translate_or_original(translator.as_ref(), raw).await,
            None => raw.to_string(),
        };

        let reference = resolve_reference(&self.client, &text).await;
        NormalizedPrompt {
            text,
            reference_image_base64: reference,
        }
    }
}

impl std::fmt::Debug for RequestNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestNormalizer")
            .field("translates", &self.translates())
            .finish()
    }
}
