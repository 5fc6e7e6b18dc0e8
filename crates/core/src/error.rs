//! Error taxonomy
//!
//! Two tiers, matching how far a failure is allowed to travel:
//!
//! | Error | Scope | Recovery |
//! |-------|-------|----------|
//! | [`Unresolvable`] | one type member | drop the enclosing type, keep scanning |
//! | [`ScanError::ModuleLoad`] | one request | error response, other requests unaffected |
//! | [`ScanError::ResourceExhaustion`] | the process | recycle the service process |
//! | [`ScanError::Fatal`] | the process | terminate the service |

use thiserror::Error;

/// Which name an introspector failed to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    /// Full name of an exported type
    Type,
    /// Field identifier
    Field,
    /// Type of a field
    FieldType,
    /// Method identifier
    Method,
    /// Return type of a method
    ReturnType,
    /// Parameter identifier
    Parameter,
    /// Type of a parameter
    ParameterType,
}

impl std::fmt::Display for NameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NameKind::Type => "type name",
            NameKind::Field => "field name",
            NameKind::FieldType => "field type",
            NameKind::Method => "method name",
            NameKind::ReturnType => "return type",
            NameKind::Parameter => "parameter name",
            NameKind::ParameterType => "parameter type",
        };
        f.write_str(s)
    }
}

/// A name the introspector cannot determine
///
/// Typical causes are compiler-synthesized or open generic constructs that
/// have no stable full name. Never fatal: the extractor drops the enclosing
/// type and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot resolve {kind}: {reason}")]
pub struct Unresolvable {
    /// What was being resolved
    pub kind: NameKind,
    /// Why it failed
    pub reason: String,
}

impl Unresolvable {
    /// Create a new resolution failure
    pub fn new(kind: NameKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    /// Re-label a failure with the member kind it surfaced through
    pub fn as_kind(mut self, kind: NameKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Result of resolving one name
pub type Resolution<T> = std::result::Result<T, Unresolvable>;

/// Failure of a whole scan request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// Path missing, unreadable, or not a module the introspector understands
    #[error("failed to load module '{path}': {reason}")]
    ModuleLoad {
        /// Requested module path
        path: String,
        /// Human-readable cause
        reason: String,
    },

    /// No load context could be obtained within the wait budget
    #[error("load context limit reached: {live} of {cap} contexts live after waiting {waited_ms}ms")]
    ResourceExhaustion {
        /// Contexts live when giving up
        live: usize,
        /// Configured cap
        cap: usize,
        /// Time spent waiting for a free slot
        waited_ms: u64,
    },

    /// Internal invariant violation (bug, broken introspector contract)
    #[error("fatal: {0}")]
    Fatal(String),
}

impl ScanError {
    /// Create a module load failure
    pub fn load(path: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        ScanError::ModuleLoad {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Canonical error code
    pub fn error_code(&self) -> &'static str {
        match self {
            ScanError::ModuleLoad { .. } => "ModuleLoadFailure",
            ScanError::ResourceExhaustion { .. } => "ResourceExhaustion",
            ScanError::Fatal(_) => "Fatal",
        }
    }

    /// True for failures scoped to a single request
    pub fn is_load_failure(&self) -> bool {
        matches!(self, ScanError::ModuleLoad { .. })
    }

    /// True when the service should recycle its process
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, ScanError::ResourceExhaustion { .. })
    }

    /// True when the service must terminate
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::Fatal(_))
    }
}
