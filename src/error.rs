//! Error types for msgrelay.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::MessageId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Request id already pending: {0}")]
    DuplicateRequestId(MessageId),

    #[error("Timed out after {after:?} waiting for response to {id}")]
    Timeout { id: MessageId, after: Duration },

    #[error("Router closed")]
    RouterClosed,

    #[error("No pending request for response {0}")]
    UnmatchedResponse(MessageId),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Relay error: {0}")]
    Relay(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the caller may reasonably retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeout_is_retryable() {
        let timeout = Error::Timeout {
            id: MessageId::new("7"),
            after: Duration::from_millis(50),
        };
        assert!(timeout.is_retryable());
        assert!(!Error::RouterClosed.is_retryable());
        assert!(!Error::DuplicateRequestId(MessageId::new("7")).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = Error::UnmatchedResponse(MessageId::new("abc"));
        assert_eq!(err.to_string(), "No pending request for response abc");
    }
}
