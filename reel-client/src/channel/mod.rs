//! Live Event Channel
//!
//! One long-lived server-sent events connection scoped to a client id. The
//! reader task decodes frames, keeps the listened event types and appends
//! them to an append-only log. Readers get snapshots; the latest event of a
//! type is always derived from the log.
//!
//! # Connection lifecycle
//! ```text
//! Disconnected → Connecting → Connected → Disconnected
//!                     │                        ↑
//!                     └── request failed ──────┘
//! ```
//! `connect` resolves once response headers arrive, so the connection is
//! registered with the backend before the caller issues the render request.
//! The wait for headers is bounded by the handshake timeout; an endpoint that
//! never answers counts as a failed connect. A dropped stream is never
//! retried; a synthetic `error` event records it.
//!
//! The channel is *visible* from a successful open until `disconnect`; a
//! dropped stream leaves it visible so the error can be shown.

pub mod sse;

use futures::StreamExt;
use reel_common::events::{ChannelErrorData, ConnectedData, EventKind, ProgressEvent};
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_PUSH_HANDSHAKE_TIMEOUT;
use crate::error::{SubmissionError, SubmissionResult};
use sse::{SseDecoder, SseFrame};

/// Capacity of the live event broadcast
const EVENT_BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Identity of one push connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSession {
    pub client_id: String,
    pub connected: bool,
}

/// Point-in-time copy of the channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSnapshot {
    pub state: ConnectionState,
    pub visible: bool,
    pub session: Option<ClientSession>,
    pub events: Vec<ProgressEvent>,
}

impl ChannelSnapshot {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn events_by_type(&self, kind: EventKind) -> Vec<&ProgressEvent> {
        self.events.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn last_event(&self, kind: EventKind) -> Option<&ProgressEvent> {
        self.events.iter().rev().find(|e| e.kind == kind)
    }
}

struct ChannelState {
    connection: ConnectionState,
    visible: bool,
    session: Option<ClientSession>,
    events: Vec<ProgressEvent>,
    /// Bumped on every connect/disconnect; stale reader tasks compare against it
    generation: u64,
    /// Cancels the reader task when dropped
    reader: Option<DropGuard>,
}

impl ChannelState {
    fn mark_disconnected(&mut self) {
        self.connection = ConnectionState::Disconnected;
        self.reader = None;
        if let Some(session) = self.session.as_mut() {
            session.connected = false;
        }
    }
}

fn append(state: &mut ChannelState, tx: &broadcast::Sender<ProgressEvent>, event: ProgressEvent) {
    debug!(event = %event.kind, "Push event recorded");
    state.events.push(event.clone());
    // No subscribers is fine
    let _ = tx.send(event);
}

fn synthetic_error(data: ChannelErrorData) -> ProgressEvent {
    let data = serde_json::to_value(data).unwrap_or(Value::Null);
    ProgressEvent::new(EventKind::ChannelError, data)
}

/// Cloneable handle to the push channel
#[derive(Clone)]
pub struct LiveEventChannel {
    http: Client,
    handshake_timeout: Duration,
    state: Arc<RwLock<ChannelState>>,
    events_tx: broadcast::Sender<ProgressEvent>,
}

impl LiveEventChannel {
    pub fn new(http: Client) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_BROADCAST_CAPACITY);
        Self {
            http,
            handshake_timeout: DEFAULT_PUSH_HANDSHAKE_TIMEOUT,
            state: Arc::new(RwLock::new(ChannelState {
                connection: ConnectionState::Disconnected,
                visible: false,
                session: None,
                events: Vec::new(),
                generation: 0,
                reader: None,
            })),
            events_tx,
        }
    }

    /// Bound the wait for the push endpoint's response headers
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Open the push connection
    ///
    /// Closes any previous connection first. Generates a client id when none
    /// is given. On failure the synthetic `error` event is appended and the
    /// channel is left disconnected.
    pub async fn connect(
        &self,
        url: &str,
        client_id: Option<String>,
    ) -> SubmissionResult<ClientSession> {
        let client_id = client_id.unwrap_or_else(reel_common::client_id::generate);

        let generation = {
            let mut state = self.state.write().await;
            if state.reader.is_some() {
                info!("Closing previous push connection");
            }
            state.mark_disconnected();
            state.generation += 1;
            state.connection = ConnectionState::Connecting;
            state.session = Some(ClientSession {
                client_id: client_id.clone(),
                connected: false,
            });
            state.generation
        };

        info!(client_id = %client_id, url = %url, "Opening push channel");
        let request = self
            .http
            .get(url)
            .query(&[("client_id", client_id.as_str())])
            .header(ACCEPT, "text/event-stream")
            .send();

        let response = match tokio::time::timeout(self.handshake_timeout, request).await {
            Ok(Ok(response)) if response.status().is_success() => response,
            Ok(Ok(response)) => {
                let message = format!("push endpoint returned HTTP {}", response.status().as_u16());
                return Err(self.fail_connect(generation, message).await);
            }
            Ok(Err(e)) => {
                return Err(self.fail_connect(generation, e.to_string()).await);
            }
            Err(_) => {
                let message = format!(
                    "push endpoint did not respond within {} ms",
                    self.handshake_timeout.as_millis()
                );
                return Err(self.fail_connect(generation, message).await);
            }
        };

        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!(client_id = %client_id, "Push connection superseded before it opened");
            return Err(SubmissionError::Channel(
                "connection superseded".to_string(),
            ));
        }

        let token = CancellationToken::new();
        let session = ClientSession {
            client_id: client_id.clone(),
            connected: true,
        };
        state.reader = Some(token.clone().drop_guard());
        state.connection = ConnectionState::Connected;
        state.visible = true;
        state.session = Some(session.clone());

        tokio::spawn(read_events(
            response,
            Arc::downgrade(&self.state),
            self.events_tx.clone(),
            generation,
            client_id,
            token,
        ));

        info!(client_id = %session.client_id, "Push channel connected");
        Ok(session)
    }

    async fn fail_connect(&self, generation: u64, message: String) -> SubmissionError {
        warn!(error = %message, "Push channel failed to open");
        let mut state = self.state.write().await;
        if state.generation == generation {
            append(
                &mut state,
                &self.events_tx,
                synthetic_error(ChannelErrorData::connection_lost()),
            );
            state.mark_disconnected();
        }
        SubmissionError::Channel(message)
    }

    /// Close the connection; safe to call any number of times
    pub async fn disconnect(&self) {
        let mut state = self.state.write().await;
        let was_open = state.connection != ConnectionState::Disconnected;
        state.generation += 1;
        state.mark_disconnected();
        state.visible = false;
        if was_open {
            let client_id = state
                .session
                .as_ref()
                .map(|s| s.client_id.as_str())
                .unwrap_or_default();
            info!(client_id = %client_id, "Push channel closed");
        }
    }

    /// Empty the event log; connection state is unaffected
    pub async fn clear_events(&self) {
        self.state.write().await.events.clear();
    }

    /// Receive events as they are recorded
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events_tx.subscribe()
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.connection
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Open since the last successful connect and not yet disconnected
    pub async fn is_visible(&self) -> bool {
        self.state.read().await.visible
    }

    pub async fn session(&self) -> Option<ClientSession> {
        self.state.read().await.session.clone()
    }

    pub async fn events(&self) -> Vec<ProgressEvent> {
        self.state.read().await.events.clone()
    }

    pub async fn events_by_type(&self, kind: EventKind) -> Vec<ProgressEvent> {
        let state = self.state.read().await;
        state
            .events
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Most recent event of a type
    pub async fn last_event(&self, kind: EventKind) -> Option<ProgressEvent> {
        let state = self.state.read().await;
        state.events.iter().rev().find(|e| e.kind == kind).cloned()
    }

    /// Most recent event of any type
    pub async fn last_event_any(&self) -> Option<ProgressEvent> {
        self.state.read().await.events.last().cloned()
    }

    pub async fn snapshot(&self) -> ChannelSnapshot {
        let state = self.state.read().await;
        ChannelSnapshot {
            state: state.connection,
            visible: state.visible,
            session: state.session.clone(),
            events: state.events.clone(),
        }
    }
}

/// Reader task: decode frames until cancelled or the stream ends
async fn read_events(
    response: Response,
    state: Weak<RwLock<ChannelState>>,
    tx: broadcast::Sender<ProgressEvent>,
    generation: u64,
    client_id: String,
    token: CancellationToken,
) {
    let mut stream = Box::pin(response.bytes_stream());
    let mut decoder = SseDecoder::new();

    loop {
        let chunk = tokio::select! {
            _ = token.cancelled() => {
                debug!(client_id = %client_id, "Push reader cancelled");
                return;
            }
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for frame in decoder.push(&bytes) {
                    let Some(state) = state.upgrade() else {
                        return;
                    };
                    if !accept_frame(&state, &tx, generation, &client_id, frame).await {
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                warn!(client_id = %client_id, error = %e, "Push stream failed");
                break;
            }
            None => {
                info!(client_id = %client_id, "Push stream closed by server");
                break;
            }
        }
    }

    if let Some(state) = state.upgrade() {
        let mut state = state.write().await;
        if state.generation == generation && state.connection != ConnectionState::Disconnected {
            append(
                &mut state,
                &tx,
                synthetic_error(ChannelErrorData::connection_lost()),
            );
            state.mark_disconnected();
        }
    }
}

/// Record one frame; returns false when the reader must stop
async fn accept_frame(
    state: &RwLock<ChannelState>,
    tx: &broadcast::Sender<ProgressEvent>,
    generation: u64,
    client_id: &str,
    frame: SseFrame,
) -> bool {
    let Some(kind) = EventKind::from_wire(frame.event_name()) else {
        debug!(event = %frame.event_name(), "Ignoring unlisted push event");
        return true;
    };

    let data: Value = match serde_json::from_str(&frame.data) {
        Ok(data) => data,
        Err(e) => {
            warn!(event = %kind, error = %e, "Skipping push event with malformed data");
            return true;
        }
    };

    let echoed = match kind {
        EventKind::Connected => serde_json::from_value::<ConnectedData>(data.clone())
            .ok()
            .map(|ack| ack.client_id),
        _ => None,
    };

    let mut state = state.write().await;
    if state.generation != generation {
        return false;
    }
    append(&mut state, tx, ProgressEvent::new(kind, data));

    if let Some(echoed) = echoed.filter(|echoed| echoed != client_id) {
        warn!(
            client_id = %client_id,
            echoed = %echoed,
            "Push connection acknowledged a different client id"
        );
        append(
            &mut state,
            tx,
            synthetic_error(ChannelErrorData::client_id_mismatch()),
        );
        state.mark_disconnected();
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        format!("http://127.0.0.1:{}/api/sse/video_update", port)
    }

    #[tokio::test]
    async fn test_starts_disconnected_and_empty() {
        let channel = LiveEventChannel::new(Client::new());
        assert_eq!(channel.state().await, ConnectionState::Disconnected);
        assert!(channel.session().await.is_none());
        assert!(channel.events().await.is_empty());
        assert!(channel.last_event_any().await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let channel = LiveEventChannel::new(Client::new());
        channel.disconnect().await;
        channel.disconnect().await;
        assert!(!channel.is_connected().await);
        assert!(channel.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_connect_appends_synthetic_error() {
        let channel = LiveEventChannel::new(Client::new());
        let mut rx = channel.subscribe();

        let result = channel
            .connect(&closed_port_url(), Some("client_1_abcdefghi".to_string()))
            .await;
        assert!(matches!(result, Err(SubmissionError::Channel(_))));

        assert_eq!(channel.state().await, ConnectionState::Disconnected);
        let session = channel.session().await.expect("session kept");
        assert_eq!(session.client_id, "client_1_abcdefghi");
        assert!(!session.connected);

        let event = channel
            .last_event(EventKind::ChannelError)
            .await
            .expect("synthetic error");
        let data: ChannelErrorData = event.payload().expect("error shape");
        assert_eq!(data.stage, ChannelErrorData::CONNECTION_FAILED);
        assert_eq!(data.error, "Connection lost. Please try again.");

        let broadcast = rx.recv().await.expect("broadcast");
        assert_eq!(broadcast.kind, EventKind::ChannelError);
    }

    #[tokio::test]
    async fn test_generates_client_id_when_omitted() {
        let channel = LiveEventChannel::new(Client::new());
        let _ = channel.connect(&closed_port_url(), None).await;
        let session = channel.session().await.expect("session");
        assert!(reel_common::client_id::is_well_formed(&session.client_id));
    }

    #[tokio::test]
    async fn test_clear_events_keeps_session() {
        let channel = LiveEventChannel::new(Client::new());
        let _ = channel.connect(&closed_port_url(), None).await;
        assert_eq!(channel.events().await.len(), 1);

        channel.clear_events().await;
        assert!(channel.events().await.is_empty());
        assert!(channel.session().await.is_some());
    }

    #[test]
    fn test_snapshot_derivations() {
        let snapshot = ChannelSnapshot {
            state: ConnectionState::Connected,
            visible: true,
            session: None,
            events: vec![
                ProgressEvent::new(EventKind::VideoProgress, serde_json::json!({"progress": 10})),
                ProgressEvent::new(EventKind::Heartbeat, serde_json::json!({})),
                ProgressEvent::new(EventKind::VideoProgress, serde_json::json!({"progress": 5})),
            ],
        };
        assert!(snapshot.is_connected());
        assert_eq!(snapshot.events_by_type(EventKind::VideoProgress).len(), 2);
        let last = snapshot.last_event(EventKind::VideoProgress).expect("progress");
        assert_eq!(last.data["progress"], 5);
        assert!(snapshot.last_event(EventKind::Notification).is_none());
    }
}
