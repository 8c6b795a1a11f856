//! Push-channel event types
//!
//! The render backend streams named server-sent events to the client that
//! opened `GET <sse-endpoint>?client_id=<id>`. Every received event becomes a
//! [`ProgressEvent`] in the channel's append-only log.

mod payloads;

pub use payloads::{ChannelErrorData, ConnectedData, NotificationData, VideoErrorData, VideoProgressData};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Event types known to the push channel
///
/// The first six are the named events the channel listens for. `ChannelError`
/// is never received from the wire; the channel appends it itself when the
/// connection drops or the connection-ack does not echo the client id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Connection-ack, carries the echoed `client_id`
    Connected,
    /// Render progress `{stage, message, progress}`
    VideoProgress,
    /// Render error reported by the backend `{error, stage}`
    VideoError,
    Heartbeat,
    TimelineUpdate,
    /// Generic notification carrying a `read` flag
    Notification,
    /// Synthetic transport-level error
    #[serde(rename = "error")]
    ChannelError,
}

impl EventKind {
    /// Named events the channel subscribes to, in wire form
    pub const LISTENED: [EventKind; 6] = [
        EventKind::Connected,
        EventKind::VideoProgress,
        EventKind::VideoError,
        EventKind::Heartbeat,
        EventKind::TimelineUpdate,
        EventKind::Notification,
    ];

    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::VideoProgress => "video_progress",
            EventKind::VideoError => "video_error",
            EventKind::Heartbeat => "heartbeat",
            EventKind::TimelineUpdate => "timeline_update",
            EventKind::Notification => "notification",
            EventKind::ChannelError => "error",
        }
    }

    /// Map a wire event name onto a listened kind
    ///
    /// Returns `None` for anything outside [`EventKind::LISTENED`], including
    /// `error`: a server cannot forge the synthetic channel error.
    pub fn from_wire(name: &str) -> Option<EventKind> {
        Self::LISTENED.into_iter().find(|k| k.as_str() == name)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the push-event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Decoded JSON payload
    pub data: serde_json::Value,
    /// Receive time, milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl ProgressEvent {
    /// Create an event stamped with the current time
    pub fn new(kind: EventKind, data: serde_json::Value) -> Self {
        Self {
            kind,
            data,
            timestamp: crate::time::now_millis(),
        }
    }

    /// Decode the payload into a typed shape, `None` if it does not fit
    pub fn payload<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.data.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_names_round_trip() {
        for kind in EventKind::LISTENED {
            assert_eq!(EventKind::from_wire(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_and_synthetic_names_are_not_listened() {
        assert_eq!(EventKind::from_wire("message"), None);
        assert_eq!(EventKind::from_wire("batchComplete"), None);
        assert_eq!(EventKind::from_wire("error"), None);
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let event = ProgressEvent {
            kind: EventKind::ChannelError,
            data: json!({"error": "x"}),
            timestamp: 1,
        };
        let value = serde_json::to_value(&event).expect("serializes");
        assert_eq!(value["type"], "error");

        let parsed: ProgressEvent = serde_json::from_value(json!({
            "type": "video_progress",
            "data": {"stage": "encoding", "message": "m", "progress": 40},
            "timestamp": 5
        }))
        .expect("parses");
        assert_eq!(parsed.kind, EventKind::VideoProgress);
    }

    #[test]
    fn test_typed_payload_decode() {
        let event = ProgressEvent::new(
            EventKind::VideoProgress,
            json!({"stage": "encoding", "message": "Encoding video", "progress": 55}),
        );
        let data: VideoProgressData = event.payload().expect("fits progress shape");
        assert_eq!(data.stage, "encoding");
        assert_eq!(data.progress, 55.0);

        let wrong: Option<VideoErrorData> = event.payload();
        assert!(wrong.is_none());
    }
}
