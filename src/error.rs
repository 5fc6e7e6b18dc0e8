//! Unified error types for asminfo.
//!
//! This module provides a clean error type that wraps the per-crate errors
//! and presents a consistent interface to users.

use asminfo_core::ScanError;
use asminfo_engine::ConfigError;
use asminfo_executor::ExecutorError;
use thiserror::Error;

/// All asminfo errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The module could not be read or is not a module the introspector
    /// understands
    #[error("failed to load module '{path}': {reason}")]
    Load {
        /// Requested path
        path: String,
        /// Human-readable cause
        reason: String,
    },

    /// No load context became free in time
    #[error("resource exhaustion: {0}")]
    Exhausted(String),

    /// Configuration could not be read or is out of range
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A service request line was malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error (bug or broken introspector)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for asminfo operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if the module itself could not be loaded.
    pub fn is_load_failure(&self) -> bool {
        matches!(self, Error::Load { .. })
    }

    /// Check if the context cap was exhausted.
    ///
    /// A long-running process that sees this should recycle.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Error::Exhausted(_))
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Internal(_) | Error::Io(_))
    }
}

impl From<ScanError> for Error {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::ModuleLoad { path, reason } => Error::Load { path, reason },
            e @ ScanError::ResourceExhaustion { .. } => Error::Exhausted(e.to_string()),
            ScanError::Fatal(msg) => Error::Internal(msg),
        }
    }
}

impl From<ExecutorError> for Error {
    fn from(e: ExecutorError) -> Self {
        match e {
            ExecutorError::InvalidRequest(msg) => Error::InvalidRequest(msg),
            ExecutorError::Io(io) => Error::Io(io),
            ExecutorError::Encode(err) => Error::Serialization(err.to_string()),
            ExecutorError::Fatal(msg) => Error::Internal(msg),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
