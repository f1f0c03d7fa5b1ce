//! Error types for switchyard
//!
//! Two error types cooperate here:
//!
//! - **Error**: the application-level taxonomy used throughout the crates
//!   (uses thiserror)
//! - **ProtocolError**: the wire-format error object carried in response
//!   messages: `{ name, message? }`
//!
//! # Error Names
//!
//! The broker and its clients agree on a small set of well-known error names.
//! `Error::name()` produces the name for outgoing errors, and
//! `Error::from(ProtocolError)` recognizes the well-known names on incoming
//! errors so callers can match on typed variants instead of strings.
//!
//! # Propagation policy
//!
//! Errors tied to a single request (a response carrying an error, local
//! validation) reject only that caller. Connection-wide failures
//! (`ConnectionClosed`, `ConnectionAborted`, `ConnectionFailed`) are
//! broadcast once to every pending request and every topic subscriber.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for switchyard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Well-known error names shared with the broker.
pub mod error_names {
    pub const CONNECTION_CLOSED: &str = "ConnectionClosed";
    pub const CONNECTION_ABORTED: &str = "ConnectionAborted";
    pub const CONNECTION_FAILED: &str = "ConnectionFailed";
    pub const DUPLICATE_ENDPOINT: &str = "DuplicateEndpoint";
    pub const UNKNOWN_ENDPOINT: &str = "UnknownEndpoint";
    pub const INVALID_TOPIC: &str = "InvalidTopic";
    pub const INVALID_ENDPOINT: &str = "InvalidEndpoint";
}

/// Application-level error type for switchyard operations
///
/// # Error Categories
///
/// - **Lifecycle errors**: `ConnectionClosed`, `ConnectionAborted`,
///   `ConnectionFailed` — the connection is gone or never came up
/// - **Registration errors**: `DuplicateEndpoint`, `UnknownEndpoint`
/// - **Validation errors**: `InvalidTopic`, `InvalidEndpoint`
/// - **Relayed errors**: `Protocol` wraps whatever `{name, message}` the
///   broker sent when it does not map to a typed variant
/// - **Processing errors**: `Serialization`
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// An operation was attempted after (or during) `close()`.
    #[error("the connection has been closed")]
    ConnectionClosed,

    /// The transport failed or the broker closed the connection on us.
    /// Distinct from `ConnectionClosed` so callers can tell "I closed it"
    /// from "it died".
    #[error("the connection was aborted")]
    ConnectionAborted,

    /// The handshake never completed because of a transport-level failure.
    #[error("could not connect to the message router: {0}")]
    ConnectionFailed(String),

    /// A handler is already registered for this endpoint on this client.
    #[error("duplicate endpoint: {0}")]
    DuplicateEndpoint(String),

    /// An invoke targeted an endpoint with no registered handler.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// Topic name failed syntactic validation.
    #[error("invalid topic name: {0:?}")]
    InvalidTopic(String),

    /// Endpoint name failed syntactic validation.
    #[error("invalid endpoint name: {0:?}")]
    InvalidEndpoint(String),

    /// Broker-relayed error that does not map to a typed variant.
    #[error("{0}")]
    Protocol(ProtocolError),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Wire-format name of this error.
    pub fn name(&self) -> &str {
        match self {
            Error::ConnectionClosed => error_names::CONNECTION_CLOSED,
            Error::ConnectionAborted => error_names::CONNECTION_ABORTED,
            Error::ConnectionFailed(_) => error_names::CONNECTION_FAILED,
            Error::DuplicateEndpoint(_) => error_names::DUPLICATE_ENDPOINT,
            Error::UnknownEndpoint(_) => error_names::UNKNOWN_ENDPOINT,
            Error::InvalidTopic(_) => error_names::INVALID_TOPIC,
            Error::InvalidEndpoint(_) => error_names::INVALID_ENDPOINT,
            Error::Protocol(err) => &err.name,
            Error::Serialization(_) => "Error",
        }
    }

    /// True for errors that tear down the whole connection rather than a
    /// single request.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::ConnectionClosed | Error::ConnectionAborted | Error::ConnectionFailed(_)
        )
    }
}

/// Wire-format error object carried in response messages
///
/// The broker sends `{ name, message? }`; anything beyond the well-known
/// names is opaque and surfaced as `Error::Protocol`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolError {
    /// Error name, ideally one of the well-known names.
    pub name: String,

    /// Optional human-readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProtocolError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: Some(message.into()),
        }
    }

    pub fn from_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: None,
        }
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.name, message),
            None => write!(f, "{}", self.name),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<&Error> for ProtocolError {
    /// Build the wire-format error for an outgoing response.
    fn from(error: &Error) -> Self {
        ProtocolError {
            name: error.name().to_string(),
            message: Some(error.to_string()),
        }
    }
}

impl From<ProtocolError> for Error {
    /// Map a received error back to a typed variant where the name is
    /// well-known; otherwise keep it as a relayed protocol error.
    fn from(err: ProtocolError) -> Self {
        let detail = || err.message.clone().unwrap_or_default();
        match err.name.as_str() {
            error_names::CONNECTION_CLOSED => Error::ConnectionClosed,
            error_names::CONNECTION_ABORTED => Error::ConnectionAborted,
            error_names::CONNECTION_FAILED => Error::ConnectionFailed(detail()),
            error_names::DUPLICATE_ENDPOINT => Error::DuplicateEndpoint(detail()),
            error_names::UNKNOWN_ENDPOINT => Error::UnknownEndpoint(detail()),
            _ => Error::Protocol(err),
        }
    }
}
