//! Prompt translation through an OpenAI-compatible chat endpoint.

use crate::config::TranslationConfig;
use crate::error::{truncate_for_diagnostics, GatewayError, Result};
use crate::protocol::{ChatCompletionCall, ChatCompletionResponse, ChatMessage};
use crate::storage::key::join_url;
use async_trait::async_trait;

/// Translation collaborator.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translates `text`. Errors are reported; callers decide how to recover.
    async fn translate(&self, text: &str) -> Result<String>;
}

/// Translates `text`, returning it unchanged on any failure.
pub async fn translate_or_original(translator: &dyn Translator, text: &str) -> String {
    match translator.translate(text).await {
        Ok(translated) => {
            tracing::debug!(original = %text, translated = %translated, "prompt translated");
            translated
        }
        Err(e) => {
            tracing::warn!(error = %e, "translation failed, using original text");
            text.to_string()
        }
    }
}

/// Translator backed by `POST {url}/v1/chat/completions`.
#[derive(Debug, Clone)]
pub struct ChatTranslator {
    client: reqwest::Client,
    config: TranslationConfig,
}

impl ChatTranslator {
    /// Creates a translator from configuration.
    pub fn new(client: reqwest::Client, config: TranslationConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Translator for ChatTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        let body = ChatCompletionCall {
            model: &self.config.model,
            messages: vec![
                ChatMessage::new("system", self.config.role.clone()),
                ChatMessage::new("user", text),
            ],
        };

        let response = self
            .client
            .post(join_url(&self.config.url, "/v1/chat/completions"))
            .bearer_auth(&self.config.key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Translation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Translation(format!(
                "status {}: {}",
                status.as_u16(),
                truncate_for_diagnostics(&text)
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Translation(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.text())
            .ok_or_else(|| GatewayError::Translation("no choices returned".into()))
    }
}
