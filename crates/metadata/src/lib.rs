//! ECMA-335 CLI metadata introspector
//!
//! Reads managed PE images (`.dll`/`.exe`) down to the metadata tables and
//! exposes them through the [`asminfo_core::Introspector`] contract. Nothing
//! is executed and no referenced module is opened: type names that live in
//! other modules are rendered from the TypeRef rows of this one.
//!
//! Layering, bottom-up:
//! - `pe`: DOS/PE headers, sections, RVA mapping, CLI header
//! - `root`: metadata root and stream directory
//! - `heaps`, `tables`: `#Strings`/`#Blob` and the `#~` tables
//! - `signature`: signature blobs → full type names
//! - [`module`]: exported types and their public members
//!
//! `writer` is the inverse: an image builder used by tests to produce
//! modules without a compiler. It is compiled only with the `test-utils`
//! feature.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub mod flags;
mod heaps;
pub mod module;
mod pe;
mod reader;
mod root;
mod signature;
mod tables;
#[cfg(any(test, feature = "test-utils"))]
pub mod writer;

pub use error::{MetadataError, Result};
pub use module::ClrModule;
pub use tables::TableId;
#[cfg(any(test, feature = "test-utils"))]
pub use writer::{ImageBuilder, SigType, TypeToken};

use asminfo_core::{Introspector, LoadContext, LoadedModule, ScanError};
use tracing::debug;

/// Introspector for ECMA-335 managed modules
#[derive(Debug, Clone, Copy, Default)]
pub struct ClrIntrospector;

impl ClrIntrospector {
    /// Create the introspector
    pub fn new() -> Self {
        Self
    }
}

impl Introspector for ClrIntrospector {
    fn name(&self) -> &'static str {
        "ecma335"
    }

    fn load<'ctx>(
        &self,
        context: &'ctx LoadContext,
    ) -> std::result::Result<Box<dyn LoadedModule + 'ctx>, ScanError> {
        let module = ClrModule::parse(context.image()).map_err(|e| {
            debug!(
                context_id = %context.id(),
                path = %context.path().display(),
                error = %e,
                "image rejected"
            );
            ScanError::load(context.path().display(), e.to_string())
        })?;
        Ok(Box::new(module))
    }
}
