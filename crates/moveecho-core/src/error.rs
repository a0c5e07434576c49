//! Error types for the MoveEcho location-sharing client.
//!
//! Every failure in the messaging core is recoverable: handshake failures
//! feed the reconnect state machine, publish failures drop the sample, and
//! subscribe failures are retried on the next successful connection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using MoveEchoError as the error type.
pub type Result<T> = std::result::Result<T, MoveEchoError>;

/// Top-level error type for MoveEcho operations.
#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum MoveEchoError {
    /// Broker handshake errors
    #[error("Connect error: {0}")]
    Connect(#[from] ConnectError),

    /// Publish errors
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Subscribe errors
    #[error("Subscribe error: {0}")]
    Subscribe(#[from] SubscribeError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Internal errors that shouldn't normally occur
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while establishing a broker connection.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectError {
    /// The broker address could not be used
    #[error("Invalid broker address '{uri}': {reason}")]
    InvalidAddress { uri: String, reason: String },

    /// The handshake did not complete in time
    #[error("Connection timeout after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The broker answered the handshake with a refusal
    #[error("Broker refused connection: {reason}")]
    Refused { reason: String },

    /// Network or protocol failure during the handshake
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// Retry budget exhausted
    #[error("Maximum reconnection attempts ({max_attempts}) reached")]
    RetriesExhausted { max_attempts: u32 },
}

impl ConnectError {
    /// Creates a transport error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Creates a refused error.
    pub fn refused(reason: impl Into<String>) -> Self {
        Self::Refused {
            reason: reason.into(),
        }
    }

    /// Returns true if retrying the handshake may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectError::Timeout { .. } | ConnectError::Transport { .. }
        )
    }
}

/// Errors raised by a publish call. None of them are fatal: the sample is
/// dropped and the next periodic sample supersedes it.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishError {
    /// No live broker connection
    #[error("Not connected")]
    NotConnected,

    /// Outbound request queue is full
    #[error("Outbound queue full")]
    Backpressure,

    /// The transport rejected the publish
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// The sample could not be encoded
    #[error("Encode error: {reason}")]
    Encode { reason: String },
}

impl PublishError {
    /// Creates a transport error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Returns true for the expected "offline" outcome.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, PublishError::NotConnected)
    }
}

/// Errors raised by a subscribe call. The subscription stays recorded and is
/// reissued on the next successful connection.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscribeError {
    /// No live broker connection
    #[error("Not connected")]
    NotConnected,

    /// The transport rejected the subscribe request
    #[error("Subscribe to '{topic}' failed: {reason}")]
    Transport { topic: String, reason: String },
}

/// Errors related to configuration.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_transient() {
        assert!(ConnectError::Timeout { timeout_secs: 10 }.is_transient());
        assert!(ConnectError::transport("connection refused").is_transient());
        assert!(!ConnectError::refused("not authorized").is_transient());
    }

    #[test]
    fn test_error_serialization() {
        let err = MoveEchoError::Publish(PublishError::NotConnected);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("Publish"));
        assert!(json.contains("NotConnected"));
    }

    #[test]
    fn test_error_display() {
        let err = ConnectError::RetriesExhausted { max_attempts: 5 };
        assert_eq!(err.to_string(), "Maximum reconnection attempts (5) reached");

        let err = ConfigError::invalid_value("broker.topic", "cannot be empty");
        assert!(err.to_string().contains("broker.topic"));
    }
}
