//! Error types for server-config.

use std::time::Duration;

/// Result type alias for server-config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while building the manager or talking to its collaborators.
///
/// None of these ever reach the consumers of a resolved configuration: fetch
/// failures are reported through [`ErrorState`](crate::core::ErrorState) instead.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The write key is empty or otherwise unusable.
    #[error("Invalid write key: {0}")]
    InvalidWriteKey(String),

    /// A builder option has an invalid value.
    #[error("Invalid option '{option}': {reason}")]
    InvalidOption {
        /// The option name
        option: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// The HTTP transport failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A document or cached blob could not be (de)serialized.
    #[error("Failed to deserialize configuration: {0}")]
    Deserialization(String),

    /// The persistence collaborator rejected a read or write.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The fetch-resolve cycle did not finish within the allotted time.
    #[error("Server configuration not resolved after {0:?}")]
    NotReady(Duration),

    /// The background worker could not be started.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Deserialization(err.to_string())
    }
}

/// Failures reported by an [`HttpTransport`](crate::sources::HttpTransport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request was rejected before it reached the server.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other transport failure, including body read errors.
    #[error("{0}")]
    Other(String),
}
