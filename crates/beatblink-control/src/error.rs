//! Error types for the broadcast and control layer
use beatblink_core::CoreError;
use thiserror::Error;

/// Broadcast / web / client errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// The hub task has stopped and no longer accepts commands
    #[error("Hub unavailable: {0}")]
    HubUnavailable(String),

    /// Configuration update rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// HTTP API error
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid message format
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Illegal connection lifecycle transition
    #[error("Invalid connection transition: {0}")]
    InvalidTransition(String),
}

impl From<CoreError> for ControlError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidConfiguration(msg) => ControlError::InvalidConfiguration(msg),
            CoreError::Io(e) => ControlError::IoError(e),
            CoreError::Json(e) => ControlError::JsonError(e),
            other => ControlError::InvalidMessage(other.to_string()),
        }
    }
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
