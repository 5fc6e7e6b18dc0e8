//! Type System Introspector contract
//!
//! An introspector turns the raw image held by a [`LoadContext`] into a
//! [`LoadedModule`] view. The view borrows from the context, so nothing
//! derived from a module can outlive the request that loaded it, and two
//! contexts can never hand each other's types around: each view only ever
//! sees the bytes of its own context.
//!
//! ```text
//! LoadContext (owns image bytes)
//!   └── LoadedModule<'ctx>
//!         └── TypeDescriptor
//!               ├── MemberDescriptor (fields)
//!               └── MethodDescriptor
//!                     └── MemberDescriptor (parameters)
//! ```
//!
//! Name accessors return [`Resolution`]: an introspector reports names it
//! cannot determine instead of inventing one. Accessors are called lazily by
//! the extractor, so resolution work happens per member.

use std::path::{Path, PathBuf};

use crate::error::{Resolution, ScanError};
use crate::types::ContextId;

/// Isolation boundary for one scan request
///
/// Holds the module image read for exactly one request. Dropping the context
/// releases the image and, through the borrow of every view built on it,
/// everything extracted from it.
#[derive(Debug)]
pub struct LoadContext {
    id: ContextId,
    path: PathBuf,
    image: Vec<u8>,
}

impl LoadContext {
    /// Create a context around an already-read image
    pub fn new(path: impl Into<PathBuf>, image: Vec<u8>) -> Self {
        Self::with_id(ContextId::new(), path, image)
    }

    /// Create a context under an id reserved beforehand
    pub fn with_id(id: ContextId, path: impl Into<PathBuf>, image: Vec<u8>) -> Self {
        Self {
            id,
            path: path.into(),
            image,
        }
    }

    /// Unique id of this context
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Path the image was read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw module image
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Image size in bytes
    pub fn len(&self) -> usize {
        self.image.len()
    }

    /// True for a zero-length image
    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }
}

/// Loads modules into views over a [`LoadContext`]
///
/// Implementations must be stateless across calls (or keep only immutable
/// state): all per-module state lives in the returned view.
pub trait Introspector: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Parse the context's image into a module view
    ///
    /// Returns [`ScanError::ModuleLoad`] for images that are not modules this
    /// introspector understands.
    fn load<'ctx>(
        &self,
        context: &'ctx LoadContext,
    ) -> Result<Box<dyn LoadedModule + 'ctx>, ScanError>;
}

/// A module loaded into one context
pub trait LoadedModule {
    /// Exported types in enumeration order
    fn exported_types(&self) -> Vec<Box<dyn TypeDescriptor + '_>>;
}

/// One exported type
pub trait TypeDescriptor {
    /// Full (module-unique) name
    fn full_name(&self) -> Resolution<String>;

    /// Display name, if any
    fn short_name(&self) -> Option<String>;

    /// Fields in declaration order
    ///
    /// Fails when the member list itself cannot be enumerated.
    fn fields(&self) -> Resolution<Vec<Box<dyn MemberDescriptor + '_>>>;

    /// Methods in declaration order
    fn methods(&self) -> Resolution<Vec<Box<dyn MethodDescriptor + '_>>>;
}

/// A named, typed member: a field or a parameter
pub trait MemberDescriptor {
    /// Identifier
    fn ident(&self) -> Resolution<String>;

    /// Full name of the member's type
    fn ty_full_name(&self) -> Resolution<String>;
}

/// One method
pub trait MethodDescriptor {
    /// Method name
    fn ident(&self) -> Resolution<String>;

    /// Full name of the return type
    fn return_ty_full_name(&self) -> Resolution<String>;

    /// Parameters in declaration order
    fn params(&self) -> Resolution<Vec<Box<dyn MemberDescriptor + '_>>>;
}
