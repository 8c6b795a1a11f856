//! Chat-style message log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One display-only log entry; never mutated after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Playable reference for render-complete messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_ref: Option<String>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text.into(), None)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text.into(), None)
    }

    pub fn assistant_with_video(text: impl Into<String>, video_ref: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text.into(), Some(video_ref.into()))
    }

    fn new(role: Role, text: String, video_ref: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text,
            timestamp: Utc::now(),
            video_ref,
        }
    }
}
