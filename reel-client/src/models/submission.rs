//! Submission workflow state machine types
//!
//! A request progresses: Idle → AwaitingTimeline → TimelineReady →
//! AwaitingVideo → VideoReady, with Failed reachable from either awaiting
//! stage. Failed is a display state; new submissions re-enter the flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Current stage of the submission workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStage {
    /// Nothing submitted yet
    Idle,
    /// Timeline request in flight
    AwaitingTimeline,
    /// Timeline validated, waiting for user approval
    TimelineReady,
    /// Render request in flight
    AwaitingVideo,
    /// Render finished with a playable reference
    VideoReady,
    /// Last request failed; inputs preserved for retry
    Failed,
}

impl RequestStage {
    /// True while a network request owns the workflow
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RequestStage::AwaitingTimeline | RequestStage::AwaitingVideo)
    }
}

impl std::fmt::Display for RequestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequestStage::Idle => "idle",
            RequestStage::AwaitingTimeline => "awaiting timeline",
            RequestStage::TimelineReady => "timeline ready",
            RequestStage::AwaitingVideo => "awaiting video",
            RequestStage::VideoReady => "video ready",
            RequestStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Stage transition record, logged and kept for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransition {
    pub old_stage: RequestStage,
    pub new_stage: RequestStage,
    pub transitioned_at: DateTime<Utc>,
}

/// Backend render strategy
///
/// Both pipelines share one request/response contract and differ only in
/// the endpoint they are posted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pipeline {
    /// Local ffmpeg compositing
    Free,
    /// Cloud generation
    Pro,
}

impl std::fmt::Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pipeline::Free => f.write_str("free"),
            Pipeline::Pro => f.write_str("pro"),
        }
    }
}

impl FromStr for Pipeline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" | "local" | "ffmpeg" => Ok(Pipeline::Free),
            "pro" | "cloud" => Ok(Pipeline::Pro),
            other => Err(format!("unknown pipeline '{}' (expected free or pro)", other)),
        }
    }
}

/// A user-selected source image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    /// Original filename, preserved in the multipart body
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Read an image from disk, inferring the content type from its extension
    pub async fn from_path(path: &Path) -> reel_common::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                reel_common::Error::InvalidInput(format!("{} has no file name", path.display()))
            })?;
        Ok(Self::new(file_name, bytes))
    }
}

/// Content type for an image filename, by extension
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Playable reference to a rendered video
///
/// Either a `blob:` reference owned by the transient media store or a remote
/// URL returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResult {
    pub video_url: String,
}

impl VideoResult {
    /// True if the reference points into the local transient media store
    pub fn is_transient(&self) -> bool {
        self.video_url.starts_with(crate::transport::media::BLOB_PREFIX)
    }
}
