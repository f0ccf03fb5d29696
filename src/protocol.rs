//! OpenAI-compatible wire types.

use crate::generation::{supported_models, CharacterPrompt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Object type of a streamed chat chunk.
pub const CHAT_CHUNK_OBJECT: &str = "chat.completion.chunk";

/// A chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Message body.
    #[serde(default)]
    pub content: MessageContent,
}

impl ChatMessage {
    /// Creates a plain-text message.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: MessageContent::Text(content.into()),
        }
    }
}

/// Message content: a plain string or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// Multi-part content; only `text` parts carry prompt text.
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl MessageContent {
    /// Text of the message, with text parts joined by newlines.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// One part of a multi-part message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    /// Part type, e.g. `text`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Text of a `text` part.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// `POST /v1/chat/completions` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    /// Requested model.
    #[serde(default)]
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
}

impl ChatCompletionRequest {
    /// Content of the last `user` message, or an empty string.
    pub fn last_user_message(&self) -> String {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.text())
            .unwrap_or_default()
    }
}

/// `POST /v1/images/generations` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageGenerationRequest {
    /// Requested model.
    #[serde(default)]
    pub model: String,
    /// Prompt text.
    pub prompt: String,
    /// Number of images; only one is ever produced.
    #[serde(default)]
    pub n: Option<u32>,
    /// Accepted for compatibility; size comes from configuration.
    #[serde(default)]
    pub size: Option<String>,
    /// Accepted for compatibility.
    #[serde(default)]
    pub quality: Option<String>,
    /// Per-region prompts for v4 models.
    #[serde(default)]
    pub character_prompts: Vec<CharacterPrompt>,
}

/// Streamed chat chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// `chatcmpl-<created>`.
    pub id: String,
    /// Always `chat.completion.chunk`.
    pub object: String,
    /// Unix seconds.
    pub created: i64,
    /// Requested model name.
    pub model: String,
    /// Single choice.
    pub choices: Vec<ChunkChoice>,
}

/// Choice inside a streamed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index.
    pub index: u32,
    /// Content delta.
    pub delta: Delta,
    /// Always null.
    pub logprobs: Option<Value>,
    /// Always null.
    pub finish_reason: Option<String>,
}

/// Incremental message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// Markdown image link.
    pub content: String,
}

impl ChatCompletionChunk {
    /// A single-choice chunk carrying `content`.
    pub fn content(created: i64, model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", created),
            object: CHAT_CHUNK_OBJECT.to_string(),
            created,
            model: model.into(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta {
                    content: content.into(),
                },
                logprobs: None,
                finish_reason: None,
            }],
        }
    }
}

/// DALL·E-style image generation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGenerationResponse {
    /// One entry per image.
    pub data: Vec<ImageData>,
    /// Unix seconds.
    pub created: i64,
    /// Zeroed usage block.
    pub usage: ImageUsage,
}

/// One generated image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    /// Image URL or upload-failure sentinel.
    pub url: String,
}

/// Usage block; always zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageUsage {
    /// Always 0.
    pub prompt_tokens: u64,
    /// Always 0.
    pub completion_tokens: u64,
    /// Empty details.
    pub prompt_tokens_details: PromptTokensDetails,
    /// Empty object.
    pub completion_tokens_details: Map<String, Value>,
}

/// Prompt token breakdown; always empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptTokensDetails {
    /// Empty object.
    pub cached_tokens_details: Map<String, Value>,
}

/// Non-streaming chat completion response (the translation collaborator's reply).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    /// Completion choices.
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

/// Choice inside a chat completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// Assistant message.
    pub message: ChatMessage,
}

/// Outgoing chat completion request (used for translation).
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionCall<'a> {
    /// Translation model.
    pub model: &'a str,
    /// System and user messages.
    pub messages: Vec<ChatMessage>,
}

/// One entry of `GET /v1/models`.
#[derive(Debug, Clone, Serialize)]
pub struct ModelEntry {
    /// Model name.
    pub id: String,
    /// Always `model`.
    pub object: &'static str,
    /// Owner label.
    pub owned_by: &'static str,
}

/// `GET /v1/models` body.
#[derive(Debug, Clone, Serialize)]
pub struct ModelList {
    /// Always `list`.
    pub object: &'static str,
    /// Routable models.
    pub data: Vec<ModelEntry>,
}

impl ModelList {
    /// Lists every routable model.
    pub fn routable() -> Self {
        Self {
            object: "list",
            data: supported_models()
                .into_iter()
                .map(|route| ModelEntry {
                    id: route.model,
                    object: "model",
                    owned_by: "novelai",
                })
                .collect(),
        }
    }
}
