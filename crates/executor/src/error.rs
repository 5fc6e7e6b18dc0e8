//! Executor errors

use asminfo_core::ScanError;
use thiserror::Error;

/// Errors raised by the scan service
///
/// Only [`ExecutorError::InvalidRequest`] is answered on the wire and the
/// loop continues. Every other variant ends the serve loop.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A request line could not be understood
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Reading requests or writing responses failed
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// A response could not be encoded
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// A scan hit an unrecoverable condition
    #[error("{0}")]
    Fatal(String),
}

impl ExecutorError {
    /// True when the service must stop
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ExecutorError::InvalidRequest(_))
    }
}

impl From<ScanError> for ExecutorError {
    fn from(err: ScanError) -> Self {
        ExecutorError::Fatal(err.to_string())
    }
}

/// Result alias for executor operations
pub type Result<T> = std::result::Result<T, ExecutorError>;
