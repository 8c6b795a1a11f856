//! Typed payloads carried by push-channel events

use serde::{Deserialize, Serialize};

/// `connected` payload: the server echoes the client id it registered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedData {
    pub client_id: String,
}

/// `video_progress` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProgressData {
    /// Pipeline stage name; `completed` marks the end of rendering
    pub stage: String,
    #[serde(default)]
    pub message: String,
    /// Percentage, 0..=100
    pub progress: f64,
}

impl VideoProgressData {
    pub fn is_completed(&self) -> bool {
        self.stage == "completed"
    }
}

/// `video_error` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoErrorData {
    pub error: String,
    #[serde(default)]
    pub stage: String,
}

/// `notification` payload; extra fields are kept verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(default)]
    pub read: bool,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Payload of the synthetic channel `error` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelErrorData {
    pub error: String,
    pub stage: String,
}

impl ChannelErrorData {
    pub const CONNECTION_FAILED: &'static str = "connection_failed";
    pub const CLIENT_ID_MISMATCH: &'static str = "client_id_mismatch";

    pub fn connection_lost() -> Self {
        Self {
            error: "Connection lost. Please try again.".to_string(),
            stage: Self::CONNECTION_FAILED.to_string(),
        }
    }

    pub fn client_id_mismatch() -> Self {
        Self {
            error: "Client ID mismatch. Please try again.".to_string(),
            stage: Self::CLIENT_ID_MISMATCH.to_string(),
        }
    }
}
