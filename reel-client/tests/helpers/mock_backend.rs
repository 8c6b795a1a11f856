//! Mock render backend for integration tests
//!
//! Serves the timeline, render and push endpoints on `127.0.0.1:0`, replays
//! scripted replies and records every upload it receives.

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Multipart, Query, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use tokio::task::JoinHandle;

use reel_client::config::{
    ClientConfig, DEFAULT_EVENTS_PATH, DEFAULT_RENDER_FREE_PATH, DEFAULT_RENDER_PRO_PATH,
    DEFAULT_TIMELINE_PATH,
};

/// One multipart field as received
#[derive(Debug, Clone)]
pub struct RecordedField {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// One upload request as received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub fields: Vec<RecordedField>,
}

impl RecordedRequest {
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| String::from_utf8_lossy(&f.bytes).into_owned())
    }

    pub fn files(&self, name: &str) -> Vec<&RecordedField> {
        self.fields.iter().filter(|f| f.name == name).collect()
    }

    pub fn json(&self, name: &str) -> Option<Value> {
        self.text(name).and_then(|t| serde_json::from_str(&t).ok())
    }
}

/// Scripted HTTP reply
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Vec<u8>,
    pub delay: Option<Duration>,
}

impl MockReply {
    pub fn json(value: Value) -> Self {
        Self::json_status(200, value)
    }

    pub fn json_status(status: u16, value: Value) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("valid status"),
            content_type: "application/json".to_string(),
            body: value.to_string().into_bytes(),
            delay: None,
        }
    }

    pub fn text(status: u16, content_type: &str, body: &str) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("valid status"),
            content_type: content_type.to_string(),
            body: body.as_bytes().to_vec(),
            delay: None,
        }
    }

    pub fn video(bytes: &[u8]) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "video/mp4".to_string(),
            body: bytes.to_vec(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// One step of the push-stream script
#[derive(Debug, Clone)]
pub enum SseStep {
    /// Raw `text/event-stream` text; `{client_id}` is replaced with the caller's id
    Raw(String),
    Pause(Duration),
    /// End the stream; without it the stream stays open after the script
    Close,
}

impl SseStep {
    pub fn event(name: &str, data: Value) -> Self {
        SseStep::Raw(format!("event: {}\ndata: {}\n\n", name, data))
    }
}

#[derive(Default)]
struct MockInner {
    requests: Vec<RecordedRequest>,
    timeline_replies: VecDeque<MockReply>,
    render_replies: VecDeque<MockReply>,
    sse_script: Vec<SseStep>,
    sse_status: Option<StatusCode>,
    /// Hold the push response headers back this long
    sse_delay: Option<Duration>,
    sse_clients: Vec<String>,
}

type Shared = Arc<Mutex<MockInner>>;

/// Running mock backend; stops when dropped
pub struct MockBackend {
    pub base_url: String,
    inner: Shared,
    handle: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let inner: Shared = Arc::new(Mutex::new(MockInner::default()));

        let app = Router::new()
            .route(DEFAULT_TIMELINE_PATH, post(upload))
            .route(DEFAULT_RENDER_FREE_PATH, post(upload))
            .route(DEFAULT_RENDER_PRO_PATH, post(upload))
            .route(DEFAULT_EVENTS_PATH, get(events))
            .with_state(inner.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock backend");
        });

        Self {
            base_url: format!("http://{}", addr),
            inner,
            handle,
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.base_url.clone())
    }

    pub fn events_url(&self) -> String {
        self.config().events_url()
    }

    pub fn push_timeline_reply(&self, reply: MockReply) {
        self.inner.lock().unwrap().timeline_replies.push_back(reply);
    }

    pub fn push_render_reply(&self, reply: MockReply) {
        self.inner.lock().unwrap().render_replies.push_back(reply);
    }

    pub fn set_sse_script(&self, script: Vec<SseStep>) {
        self.inner.lock().unwrap().sse_script = script;
    }

    pub fn set_sse_status(&self, status: u16) {
        self.inner.lock().unwrap().sse_status = Some(StatusCode::from_u16(status).unwrap());
    }

    pub fn set_sse_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().sse_delay = Some(delay);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }

    /// Client ids that opened the push stream, in order
    pub fn sse_clients(&self) -> Vec<String> {
        self.inner.lock().unwrap().sse_clients.clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn upload(State(inner): State<Shared>, uri: Uri, mut multipart: Multipart) -> Response {
    let path = uri.path().to_string();

    let mut fields = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        fields.push(RecordedField {
            name,
            file_name,
            content_type,
            bytes,
        });
    }

    let reply = {
        let mut inner = inner.lock().unwrap();
        inner.requests.push(RecordedRequest {
            path: path.clone(),
            fields,
        });
        if path == DEFAULT_TIMELINE_PATH {
            inner.timeline_replies.pop_front()
        } else {
            inner.render_replies.pop_front()
        }
    };

    let Some(reply) = reply else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "no reply scripted").into_response();
    };
    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }
    (
        reply.status,
        [(header::CONTENT_TYPE, reply.content_type)],
        reply.body,
    )
        .into_response()
}

async fn events(
    State(inner): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let client_id = params.get("client_id").cloned().unwrap_or_default();

    let (script, status, delay) = {
        let mut inner = inner.lock().unwrap();
        inner.sse_clients.push(client_id.clone());
        (inner.sse_script.clone(), inner.sse_status, inner.sse_delay)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    if let Some(status) = status {
        return (status, "push unavailable").into_response();
    }

    let stream = async_stream::stream! {
        let mut closed = false;
        for step in script {
            match step {
                SseStep::Raw(text) => {
                    yield Ok::<Bytes, Infallible>(Bytes::from(text.replace("{client_id}", &client_id)));
                }
                SseStep::Pause(delay) => tokio::time::sleep(delay).await,
                SseStep::Close => {
                    closed = true;
                    break;
                }
            }
        }
        if !closed {
            std::future::pending::<()>().await;
        }
    };

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}
