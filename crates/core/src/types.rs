//! Identifier types
//!
//! - [`ContextId`]: Unique identifier for a load context (one per scan request)

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a load context
///
/// Every scan request gets a fresh context, so the id doubles as a request
/// id in logs. It is used in:
/// - the live-context set owned by the context manager
/// - tracing fields for a request's load/extract/respond pipeline
///
/// # Examples
///
/// ```
/// use asminfo_core::types::ContextId;
///
/// let a = ContextId::new();
/// let b = ContextId::new();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Create a new random ContextId using UUID v4
    pub fn new() -> Self {
        ContextId(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
