//! Error types for Warden.

use thiserror::Error;

use crate::types::State;

/// Result type alias using Warden's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Warden.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("Cannot execute request in state: {0}")]
    InvalidState(State),

    #[error("Container doesn't accept new requests")]
    NotAccepting,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // =========================================================================
    // Resource Errors
    // =========================================================================
    #[error("Cannot acquire {0}")]
    ResourceExhausted(String),

    // =========================================================================
    // Backend Errors
    // =========================================================================
    #[error("Backend {step} failed: {detail}")]
    Backend { step: String, detail: String },

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    #[error("Snapshot error: {0}")]
    Persistence(String),

    /// The container cannot safely continue; its worker stops.
    #[error("Fatal: {0}")]
    Fatal(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a resource exhaustion error for the named pool.
    pub fn resource_exhausted(kind: impl Into<String>) -> Self {
        Self::ResourceExhausted(kind.into())
    }

    /// Create a backend command failure.
    pub fn backend(step: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Backend {
            step: step.into(),
            detail: detail.into(),
        }
    }

    /// Create a snapshot persistence error.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a fatal error.
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error must stop the container's worker.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_message() {
        let err = Error::InvalidState(State::Born);
        assert_eq!(err.to_string(), "Cannot execute request in state: born");
    }

    #[test]
    fn test_backend_error_carries_detail() {
        let err = Error::backend("create", "exit status 3: mount failed");
        assert_eq!(
            err.to_string(),
            "Backend create failed: exit status 3: mount failed"
        );
        assert!(!err.is_fatal());
        assert!(Error::fatal("rm -rf failed").is_fatal());
    }
}
