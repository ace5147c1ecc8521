//! Error types for ripple.

use thiserror::Error;

/// Result type alias using ripple's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ripple operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A serialized event could not be parsed. Callers drop the record.
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// History was requested from a queue whose retention limit is 0.
    #[error("History unavailable: this queue does not store any events")]
    HistoryUnavailable,

    /// Publish, subscribe or list operation against the transport failed.
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// A transport call exceeded its I/O deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for failures caused by the external transport (including deadlines).
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::TransportUnavailable(_) | Error::Timeout(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(format!("serialization: {e}"))
    }
}
