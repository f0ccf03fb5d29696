//! Renders the stored image reference in the caller's wire format.
//!
//! The emitter runs `Idle -> Uploading -> Emitting -> Done` once per request.
//! Upload failures do not abort the request: they become
//! [`ImageReference::UploadFailed`] and are rendered as a sentinel string in
//! the same envelope a URL would use.

use crate::error::{GatewayError, Result};
use crate::protocol::{ChatCompletionChunk, ImageData, ImageGenerationResponse, ImageUsage};
use crate::storage::Uploader;
use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;

/// Terminal marker closing a chat stream.
pub const STREAM_END_FRAME: &str = "event: end\n\n";

/// Which public endpoint accepted the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSurface {
    /// `/v1/chat/completions`: a streamed chat delta.
    ChatCompletions,
    /// `/v1/images/generations`: a single JSON object.
    ImageGenerations,
}

/// Emitter lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterState {
    /// Created, nothing stored yet.
    Idle,
    /// Upload in flight.
    Uploading,
    /// Reference known, response not yet rendered.
    Emitting,
    /// Response rendered.
    Done,
}

/// Where the generated image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// Stored successfully.
    Url(String),
    /// Upload failed; the request still gets a well-formed response.
    UploadFailed {
        /// Name the image would have been stored under.
        file_name: String,
        /// Backend error, for diagnostics only.
        message: String,
    },
}

impl ImageReference {
    /// The URL, or the `error: upload failed - <file_name>` sentinel.
    pub fn link_target(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::UploadFailed { file_name, .. } => format!("error: upload failed - {}", file_name),
        }
    }

    /// Markdown image link for chat content.
    pub fn markdown(&self, file_name: &str) -> String {
        format!("![{}]({})", file_name, self.link_target())
    }

    /// Whether the upload succeeded.
    pub fn is_url(&self) -> bool {
        matches!(self, Self::Url(_))
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.link_target())
    }
}

/// A rendered response, ready to be written to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum EmittedResponse {
    /// Server-sent event frames, each written and flushed in order.
    EventStream(Vec<Bytes>),
    /// A single JSON body.
    Json(ImageGenerationResponse),
}

impl IntoResponse for EmittedResponse {
    fn into_response(self) -> Response {
        match self {
            Self::EventStream(frames) => {
                // one chunk per frame
                let stream = tokio_stream::iter(frames.into_iter().map(Ok::<_, std::io::Error>));
                let mut response = Response::new(Body::from_stream(stream));
                *response.status_mut() = StatusCode::OK;
                let headers = response.headers_mut();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
                headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
                response
            }
            Self::Json(body) => (StatusCode::OK, Json(body)).into_response(),
        }
    }
}

/// Drives one request from upload to rendered response.
#[derive(Debug)]
pub struct ResponseEmitter {
    surface: ResponseSurface,
    model: String,
    created: i64,
    state: EmitterState,
}

impl ResponseEmitter {
    /// Creates an emitter. The surface is fixed for the rest of the request.
    pub fn new(surface: ResponseSurface, model: impl Into<String>, created: i64) -> Self {
        Self {
            surface,
            model: model.into(),
            created,
            state: EmitterState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> EmitterState {
        self.state
    }

    /// Selected surface.
    pub fn surface(&self) -> ResponseSurface {
        self.surface
    }

    fn transition(&mut self, next: EmitterState) {
        tracing::debug!(from = ?self.state, to = ?next, surface = ?self.surface, "emitter transition");
        self.state = next;
    }

    /// Stores the image. Never fails: a backend error becomes
    /// [`ImageReference::UploadFailed`].
    pub async fn upload(
        &mut self,
        uploader: &dyn Uploader,
        data: &[u8],
        file_name: &str,
        folder: &str,
    ) -> ImageReference {
        self.transition(EmitterState::Uploading);
        let reference = match uploader.upload(data, file_name, folder).await {
            Ok(result) => {
                tracing::info!(
                    backend = %uploader.backend(),
                    url = %result.url,
                    size = result.size,
                    "image stored"
                );
                ImageReference::Url(result.url)
            }
            Err(e) => {
                tracing::warn!(backend = %uploader.backend(), file = file_name, error = %e, "upload failed");
                ImageReference::UploadFailed {
                    file_name: file_name.to_string(),
                    message: e.to_string(),
                }
            }
        };
        self.transition(EmitterState::Emitting);
        reference
    }

    /// Renders the response for the selected surface. Consumes the emitter.
    ///
    /// Only valid once [`upload`](Self::upload) has produced the reference.
    pub fn emit(mut self, file_name: &str, reference: &ImageReference) -> Result<EmittedResponse> {
        if self.state != EmitterState::Emitting {
            return Err(GatewayError::InvalidState(format!(
                "cannot emit from {:?}, upload has not completed",
                self.state
            )));
        }
        let response = match self.surface {
            ResponseSurface::ChatCompletions => {
                let chunk = ChatCompletionChunk::content(
                    self.created,
                    self.model.clone(),
                    reference.markdown(file_name),
                );
                let data = format!("data: {}\n\n", serde_json::to_string(&chunk)?);
                EmittedResponse::EventStream(vec![
                    Bytes::from(data),
                    Bytes::from_static(STREAM_END_FRAME.as_bytes()),
                ])
            }
            ResponseSurface::ImageGenerations => EmittedResponse::Json(ImageGenerationResponse {
                data: vec![ImageData {
                    url: reference.link_target(),
                }],
                created: self.created,
                usage: ImageUsage::default(),
            }),
        };
        self.transition(EmitterState::Done);
        Ok(response)
    }
}
