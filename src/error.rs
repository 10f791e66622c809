//! Error types for the live match client.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur when using the live match client.
#[derive(Debug, Error)]
pub enum LiveMatchError {
    /// Failed to send a frame through the push transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the push transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The push transport was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An operation needs a live push connection, but the link is down.
    #[error("not connected to server")]
    NotConnected,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP request could not be completed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The HTTP API answered with a non-success status.
    #[error("http status {status} for {url}")]
    HttpStatus {
        /// Numeric HTTP status code.
        status: u16,
        /// The requested URL.
        url: String,
    },

    /// A configured or derived URL could not be parsed.
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// A push-channel packet did not follow the Engine.IO / Socket.IO framing.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The server refused the Socket.IO namespace connection.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Chat join attempted with an empty display name.
    #[error("username must not be empty")]
    EmptyUsername,

    /// Chat send attempted with an empty message.
    #[error("message must not be empty")]
    EmptyMessage,

    /// A chat operation that requires a joined session was attempted before joining.
    #[error("not joined to the chat room")]
    NotJoined,

    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A specialized [`Result`] type for live match client operations.
pub type Result<T> = std::result::Result<T, LiveMatchError>;
