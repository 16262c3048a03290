//! Error types for unlockr
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in unlockr
#[derive(Debug, Error)]
pub enum UnlockError {
    /// A required setting, token or identifier is not configured
    #[error("Missing configuration: {0}")]
    ConfigMissing(String),

    /// Episode, series or taxonomy term not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport error or non-2xx response from a remote API
    #[error("Remote call failed: {0}")]
    RemoteCallFailed(String),

    /// Remote output could not be parsed into the expected structure
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Access type that cannot be applied to an episode
    #[error("Invalid access type: {0}")]
    InvalidAccess(String),

    /// Schedule record failed validation
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Another invocation holds the run lock
    #[error("Busy: {0}")]
    Busy(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for UnlockError {
    fn from(err: rusqlite::Error) -> Self {
        UnlockError::Storage(err.to_string())
    }
}

/// Result type alias for unlockr operations
pub type Result<T> = std::result::Result<T, UnlockError>;
