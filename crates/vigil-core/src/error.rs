//! Unified error system for the Vigil core
//!
//! A single error type covers the whole pipeline so that transport, storage,
//! and orchestration failures compose without nested error hierarchies.
//! Every failure a caller can act on has its own variant.

use serde::{Deserialize, Serialize};

/// Unified error type for all Vigil operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum VigilError {
    /// Handshake or transport failure on a device channel
    #[error("Connection error: {message}")]
    Connection {
        /// Error message describing the connection failure
        message: String,
    },

    /// Inbound frame that could not be decoded
    #[error("Malformed frame: {message}")]
    MalformedFrame {
        /// Error message describing the parse failure
        message: String,
    },

    /// Send attempted on a channel that is not open
    #[error("Channel not open: {message}")]
    ChannelNotOpen {
        /// Error message describing the rejected send
        message: String,
    },

    /// Final snapshot could not be persisted; the capture was aborted
    #[error("Snapshot persist failed: {message}")]
    SnapshotPersist {
        /// Error message describing the persist failure
        message: String,
    },

    /// Snapshot could not be fetched at download time
    #[error("Snapshot unavailable: {message}")]
    SnapshotUnavailable {
        /// Error message describing the fetch failure
        message: String,
    },

    /// Registry or alert store operation failed
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Resource not found
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl VigilError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a malformed frame error
    pub fn malformed_frame(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    /// Create a channel-not-open error
    pub fn channel_not_open(message: impl Into<String>) -> Self {
        Self::ChannelNotOpen {
            message: message.into(),
        }
    }

    /// Create a snapshot persist error
    pub fn snapshot_persist(message: impl Into<String>) -> Self {
        Self::SnapshotPersist {
            message: message.into(),
        }
    }

    /// Create a snapshot unavailable error
    pub fn snapshot_unavailable(message: impl Into<String>) -> Self {
        Self::SnapshotUnavailable {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Standard Result type for Vigil operations
pub type Result<T> = std::result::Result<T, VigilError>;

// Conversion traits for common error types

impl From<std::io::Error> for VigilError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                Self::connection(err.to_string())
            }
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for VigilError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed_frame(err.to_string())
    }
}
