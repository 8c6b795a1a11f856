//! # Reel Client Library
//!
//! Client side of the property-video workflow: upload photos and a prompt,
//! negotiate a timeline, approve it, render a video, and follow render
//! progress over a server-sent events channel.
//!
//! ## Components
//! - [`validator`]: checks server payloads against the known response shapes
//! - [`transport`]: multipart HTTP exchanges and the transient media store
//! - [`channel`]: the live push-event channel
//! - [`orchestrator`]: the submission state machine and derived views

pub mod channel;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod transport;
pub mod validator;

pub use channel::{ChannelSnapshot, ClientSession, ConnectionState, LiveEventChannel};
pub use config::ClientConfig;
pub use error::{SubmissionError, SubmissionResult, TransportError};
pub use models::{ImageFile, Message, Pipeline, RequestStage, Role, VideoResult};
pub use orchestrator::SubmissionOrchestrator;
pub use transport::{MediaStore, TransportAdapter};
pub use validator::{ResponseKind, TypedResponse, ValidationError};
