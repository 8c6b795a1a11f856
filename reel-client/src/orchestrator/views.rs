//! Derived read-only views over a channel snapshot

use reel_common::events::{
    ChannelErrorData, EventKind, ProgressEvent, VideoErrorData, VideoProgressData,
};
use serde_json::Value;

use crate::channel::ChannelSnapshot;

/// Render progress as the UI shows it
#[derive(Debug, Clone, PartialEq)]
pub struct VideoProgressView {
    pub progress: Option<VideoProgressData>,
    pub error: Option<VideoErrorData>,
    /// Synthetic channel error (connection lost, client id mismatch)
    pub channel_error: Option<ChannelErrorData>,
    pub is_connected: bool,
    /// Channel opened and not yet disconnected by the caller
    pub channel_visible: bool,
    /// `video_progress` plus `video_error` events received
    pub render_event_count: usize,
}

impl VideoProgressView {
    pub fn from_snapshot(snapshot: &ChannelSnapshot) -> Self {
        Self {
            progress: latest_payload(snapshot, EventKind::VideoProgress),
            error: latest_payload(snapshot, EventKind::VideoError),
            channel_error: latest_payload(snapshot, EventKind::ChannelError),
            is_connected: snapshot.is_connected(),
            channel_visible: snapshot.visible,
            render_event_count: snapshot.events_by_type(EventKind::VideoProgress).len()
                + snapshot.events_by_type(EventKind::VideoError).len(),
        }
    }

    /// Show the progress panel once the render reported anything, until the
    /// channel is disconnected
    pub fn is_visible(&self) -> bool {
        self.channel_visible && self.render_event_count > 0
    }

    pub fn is_complete(&self) -> bool {
        self.progress.as_ref().is_some_and(VideoProgressData::is_completed)
    }

    /// Latest percentage, clamped to 0..=100
    pub fn percent(&self) -> f64 {
        self.progress
            .as_ref()
            .map(|p| p.progress.clamp(0.0, 100.0))
            .unwrap_or(0.0)
    }
}

/// Notification feed
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationView {
    pub notifications: Vec<ProgressEvent>,
    pub last: Option<Value>,
    pub unread_count: usize,
}

impl NotificationView {
    pub fn from_snapshot(snapshot: &ChannelSnapshot) -> Self {
        let notifications: Vec<ProgressEvent> = snapshot
            .events_by_type(EventKind::Notification)
            .into_iter()
            .cloned()
            .collect();
        // Only an explicit `read: true` counts as read
        let unread_count = notifications
            .iter()
            .filter(|e| e.data.get("read").and_then(Value::as_bool) != Some(true))
            .count();
        let last = notifications.last().map(|e| e.data.clone());

        Self {
            notifications,
            last,
            unread_count,
        }
    }
}

/// Server-side timeline edits pushed over the channel
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineUpdateView {
    pub updates: Vec<ProgressEvent>,
    pub last: Option<Value>,
}

impl TimelineUpdateView {
    pub fn from_snapshot(snapshot: &ChannelSnapshot) -> Self {
        let updates: Vec<ProgressEvent> = snapshot
            .events_by_type(EventKind::TimelineUpdate)
            .into_iter()
            .cloned()
            .collect();
        let last = updates.last().map(|e| e.data.clone());
        Self { updates, last }
    }

    pub fn has_updates(&self) -> bool {
        !self.updates.is_empty()
    }
}

fn latest_payload<T: serde::de::DeserializeOwned>(
    snapshot: &ChannelSnapshot,
    kind: EventKind,
) -> Option<T> {
    snapshot.last_event(kind).and_then(ProgressEvent::payload::<T>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ConnectionState;
    use serde_json::json;

    fn snapshot(state: ConnectionState, events: Vec<ProgressEvent>) -> ChannelSnapshot {
        ChannelSnapshot {
            state,
            visible: true,
            session: None,
            events,
        }
    }

    #[test]
    fn test_progress_view_tracks_latest_as_received() {
        let snap = snapshot(
            ConnectionState::Connected,
            vec![
                ProgressEvent::new(
                    EventKind::VideoProgress,
                    json!({"stage": "encoding", "message": "Encoding", "progress": 60}),
                ),
                // Out-of-order progress is recorded as received
                ProgressEvent::new(
                    EventKind::VideoProgress,
                    json!({"stage": "compositing", "message": "Compositing", "progress": 40}),
                ),
            ],
        );

        let view = VideoProgressView::from_snapshot(&snap);
        assert!(view.is_visible());
        assert!(!view.is_complete());
        assert_eq!(view.percent(), 40.0);
        assert_eq!(view.progress.as_ref().map(|p| p.stage.as_str()), Some("compositing"));
    }

    #[test]
    fn test_progress_view_completion_and_errors() {
        let snap = snapshot(
            ConnectionState::Disconnected,
            vec![
                ProgressEvent::new(
                    EventKind::VideoError,
                    json!({"error": "ffmpeg exited", "stage": "encoding"}),
                ),
                ProgressEvent::new(
                    EventKind::VideoProgress,
                    json!({"stage": "completed", "message": "Done", "progress": 120}),
                ),
            ],
        );

        let view = VideoProgressView::from_snapshot(&snap);
        assert!(view.is_visible());
        assert!(view.is_complete());
        assert_eq!(view.percent(), 100.0);
        assert_eq!(view.error.map(|e| e.error), Some("ffmpeg exited".to_string()));
        assert!(view.channel_error.is_none());
    }

    #[test]
    fn test_progress_view_hidden_when_idle() {
        let view = VideoProgressView::from_snapshot(&snapshot(ConnectionState::Disconnected, vec![]));
        assert!(!view.is_visible());
        assert_eq!(view.percent(), 0.0);
    }

    #[test]
    fn test_progress_view_visibility_needs_render_events() {
        let chatter = vec![
            ProgressEvent::new(EventKind::Connected, json!({"client_id": "client_1_a"})),
            ProgressEvent::new(EventKind::Heartbeat, json!({})),
        ];
        let view = VideoProgressView::from_snapshot(&snapshot(ConnectionState::Connected, chatter));
        assert!(!view.is_visible(), "heartbeats alone keep the panel hidden");

        let mut snap = snapshot(
            ConnectionState::Connected,
            vec![ProgressEvent::new(
                EventKind::VideoProgress,
                json!({"stage": "encoding", "message": "", "progress": 10}),
            )],
        );
        assert!(VideoProgressView::from_snapshot(&snap).is_visible());

        // A dropped stream keeps it; an explicit disconnect hides it
        snap.state = ConnectionState::Disconnected;
        assert!(VideoProgressView::from_snapshot(&snap).is_visible());
        snap.visible = false;
        assert!(!VideoProgressView::from_snapshot(&snap).is_visible());
    }

    #[test]
    fn test_notification_unread_count() {
        let snap = snapshot(
            ConnectionState::Connected,
            vec![
                ProgressEvent::new(EventKind::Notification, json!({"read": true, "title": "a"})),
                ProgressEvent::new(EventKind::Notification, json!({"read": false, "title": "b"})),
                ProgressEvent::new(EventKind::Heartbeat, json!({})),
                ProgressEvent::new(EventKind::Notification, json!({"title": "c"})),
            ],
        );

        let view = NotificationView::from_snapshot(&snap);
        assert_eq!(view.notifications.len(), 3);
        assert_eq!(view.unread_count, 2);
        assert_eq!(view.last, Some(json!({"title": "c"})));
    }

    #[test]
    fn test_timeline_updates() {
        let empty = TimelineUpdateView::from_snapshot(&snapshot(ConnectionState::Connected, vec![]));
        assert!(!empty.has_updates());

        let snap = snapshot(
            ConnectionState::Connected,
            vec![ProgressEvent::new(
                EventKind::TimelineUpdate,
                json!({"segment": 1, "text": "Sunlit kitchen"}),
            )],
        );
        let view = TimelineUpdateView::from_snapshot(&snap);
        assert!(view.has_updates());
        assert_eq!(view.last.as_ref().map(|v| v["segment"].clone()), Some(json!(1)));
    }
}
