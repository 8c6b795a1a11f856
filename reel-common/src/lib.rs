//! # Reel Common Library
//!
//! Shared code for the reel client crates including:
//! - Timeline composition wire model
//! - Push-channel event types and payloads
//! - Configuration loading
//! - Client id and timestamp helpers

pub mod client_id;
pub mod config;
pub mod error;
pub mod events;
pub mod time;
pub mod timeline;

pub use error::{Error, Result};
pub use events::{EventKind, ProgressEvent};
pub use timeline::TimelineComposition;
