//! Error types for reel-client
//!
//! Every boundary method returns one of these as a value; nothing in the
//! submission flow panics or leaves a failure unobserved.

use thiserror::Error;

use crate::models::RequestStage;
use crate::validator::ValidationError;

/// Failure of a single HTTP exchange
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// Connection, DNS, TLS or body-read failure
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response; message is the JSON `error` field or the raw body
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// 2xx response with a content type the stage cannot use
    #[error("Unexpected content type '{content_type}' (HTTP {status}): {body}")]
    UnexpectedContentType {
        status: u16,
        content_type: String,
        body: String,
    },

    /// Request body could not be built (bad content type, unserializable timeline)
    #[error("Request encode error: {0}")]
    Encode(String),

    /// Body claimed to be JSON but did not parse
    #[error("Response decode error: {0}")]
    Decode(String),

    /// Backend answered `{"ok": false, "error": ...}`
    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Network(err.to_string())
    }
}

/// Error returned by the submission flow
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmissionError {
    /// Empty prompt or no images; caught before any network call
    #[error("{0}")]
    InputValidation(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Payload failed the response validator
    #[error("Invalid server response: {0}")]
    ResponseShape(#[from] ValidationError),

    /// Push connection could not be opened or dropped
    #[error("Channel error: {0}")]
    Channel(String),

    /// A timeline or render request is already in flight
    #[error("Request already in progress ({0})")]
    Busy(RequestStage),

    /// Operation not available in the current stage
    #[error("Cannot {action} while {stage}")]
    InvalidStage {
        action: &'static str,
        stage: RequestStage,
    },

    /// Caller dropped the request before it settled
    #[error("Request cancelled ({0})")]
    Cancelled(RequestStage),
}

/// Result type for the submission flow
pub type SubmissionResult<T> = Result<T, SubmissionError>;
