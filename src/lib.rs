//! # asminfo
//!
//! Export the structural metadata of a compiled module (types, fields,
//! methods, parameters, return types) as a stable JSON document.
//!
//! ## Quick Start
//!
//! ```ignore
//! use asminfo::prelude::*;
//!
//! let scanner = Scanner::new();
//! let result = scanner.scan("bin/Foo.dll")?;
//! assert_eq!(result.collection[0].full_name, "Foo");
//! println!("{}", result.to_json()?);
//! ```
//!
//! ## Layers
//!
//! - model and introspector traits, re-exported at the crate root
//! - [`metadata`]: ECMA-335 introspector
//! - [`engine`]: extractor and load-context lifecycle
//! - [`executor`]: persistent scan service
//!
//! [`Scanner`] bundles the layers behind one handle.

#![warn(missing_docs)]

mod error;
mod scanner;

pub mod prelude;

// Re-export main entry points
pub use error::{Error, Result};
pub use scanner::{Scanner, ScannerBuilder};

// Re-export layers
pub use asminfo_engine as engine;
pub use asminfo_executor as executor;
pub use asminfo_metadata as metadata;

// Re-export model and introspector contracts
pub use asminfo_core::naming;
pub use asminfo_core::{
    IdentTy, Introspector, LoadContext, LoadedModule, MemberDescriptor, MethodDescriptor,
    MethodRecord, NameKind, Resolution, ScanError, ScanResult, TypeDescriptor, TypeRecord,
    Unresolvable,
};
