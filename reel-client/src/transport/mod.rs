//! Transport Adapter
//!
//! Performs the HTTP exchanges for each stage of the submission flow and
//! normalizes every outcome into a typed result. Failures never escape as
//! panics; each one becomes a [`TransportError`] value.

pub mod form;
pub mod media;

use reel_common::TimelineComposition;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{SubmissionResult, TransportError};
use crate::models::{ImageFile, Pipeline, VideoResult};
use crate::validator;

pub use media::{MediaStore, StoredMedia, BLOB_PREFIX};

const USER_AGENT: &str = concat!("reel-client/", env!("CARGO_PKG_VERSION"));

/// Decoded body of a successful response
#[derive(Debug)]
enum ResponseBody {
    Json(Value),
    Video { content_type: String, bytes: Vec<u8> },
}

/// HTTP client for the timeline and render endpoints
#[derive(Debug, Clone)]
pub struct TransportAdapter {
    http: Client,
    config: ClientConfig,
    media: MediaStore,
}

impl TransportAdapter {
    /// Create an adapter with its own media store
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        Self::with_media(config, MediaStore::new())
    }

    pub fn with_media(config: ClientConfig, media: MediaStore) -> Result<Self, TransportError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| TransportError::Network(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http,
            config,
            media,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    /// Underlying HTTP client, shared with the push channel
    pub fn http_client(&self) -> &Client {
        &self.http
    }

    /// Upload the prompt and images and return the validated proposed timeline
    pub async fn request_timeline(
        &self,
        prompt: &str,
        images: &[ImageFile],
    ) -> SubmissionResult<TimelineComposition> {
        let url = self.config.timeline_url();
        info!(url = %url, images = images.len(), "Requesting timeline");

        let form = form::timeline_form(prompt, images)?;
        let response = self.http.post(&url).multipart(form).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Timeline request failed");
            TransportError::from(e)
        })?;

        let payload = match read_body(response, false).await? {
            ResponseBody::Json(value) => value,
            // read_body only yields video bodies when asked to
            ResponseBody::Video { content_type, .. } => {
                return Err(TransportError::Decode(format!(
                    "unexpected {} body from timeline endpoint",
                    content_type
                ))
                .into())
            }
        };

        let timeline = validator::validate_timeline(&payload).map_err(|e| {
            warn!(issues = e.issues.len(), "Timeline response failed validation: {}", e);
            e
        })?;
        debug!(
            segments = timeline.timeline.image_segments.len(),
            captions = timeline.timeline.text_segments.len(),
            "Timeline validated"
        );
        Ok(timeline)
    }

    /// Submit the approved timeline to a render pipeline
    ///
    /// A binary `video/*` body is kept in the media store and returned as a
    /// `blob:` reference that the caller must release. A JSON body is taken
    /// as a remote reference.
    pub async fn request_render(
        &self,
        pipeline: Pipeline,
        prompt: &str,
        images: &[ImageFile],
        timeline: &TimelineComposition,
        client_id: &str,
    ) -> SubmissionResult<VideoResult> {
        let url = self.config.render_url(pipeline);
        info!(
            url = %url,
            pipeline = %pipeline,
            client_id = %client_id,
            "Requesting render"
        );

        let form = form::render_form(prompt, images, timeline, client_id)?;
        let response = self.http.post(&url).multipart(form).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Render request failed");
            TransportError::from(e)
        })?;

        let normalized = match read_body(response, true).await? {
            ResponseBody::Video {
                content_type,
                bytes,
            } => {
                let size = bytes.len();
                let reference = self.media.insert(bytes, content_type);
                info!(reference = %reference, size, "Render returned video body");
                json!({ "videoUrl": reference })
            }
            ResponseBody::Json(value) => {
                if value.get("ok").and_then(Value::as_bool) == Some(false) {
                    let message = error_field(&value).unwrap_or_else(|| "render failed".to_string());
                    warn!(error = %message, "Render rejected by backend");
                    return Err(TransportError::Rejected(message).into());
                }
                value
            }
        };

        match validator::validate_video(&normalized) {
            Ok(video) => Ok(video),
            Err(e) => {
                // Do not leak a freshly minted reference on a rejected shape
                if let Some(url) = normalized.get("videoUrl").and_then(Value::as_str) {
                    self.media.release(url);
                }
                Err(e.into())
            }
        }
    }
}

/// Classify a response by status and content type
async fn read_body(response: Response, accept_video: bool) -> Result<ResponseBody, TransportError> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body, status.canonical_reason());
        warn!(status = status.as_u16(), error = %message, "Request returned error status");
        return Err(TransportError::Status {
            status: status.as_u16(),
            message,
        });
    }

    if is_json(&content_type) {
        let bytes = response.bytes().await?;
        return serde_json::from_slice(&bytes)
            .map(ResponseBody::Json)
            .map_err(|e| TransportError::Decode(e.to_string()));
    }

    if accept_video && content_type.starts_with("video/") {
        let bytes = response.bytes().await?;
        let content_type = content_type
            .split(';')
            .next()
            .unwrap_or("video/mp4")
            .trim()
            .to_string();
        return Ok(ResponseBody::Video {
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(TransportError::UnexpectedContentType {
        status: status.as_u16(),
        content_type,
        body,
    })
}

fn is_json(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    essence == "application/json" || essence.ends_with("+json")
}

/// The JSON `error` field if present, else the raw body text
fn error_message(body: &str, reason: Option<&str>) -> String {
    if let Some(message) = serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(error_field)
    {
        return message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        reason.unwrap_or("no response body").to_string()
    } else {
        trimmed.to_string()
    }
}

fn error_field(value: &Value) -> Option<String> {
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
