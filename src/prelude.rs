//! Convenient imports for asminfo.
//!
//! ```ignore
//! use asminfo::prelude::*;
//!
//! let result = Scanner::new().scan("bin/Foo.dll")?;
//! ```

// Main entry point
pub use crate::scanner::{Scanner, ScannerBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Model
pub use asminfo_core::{IdentTy, MethodRecord, ScanResult, TypeRecord};

// Service
pub use asminfo_executor::{ServeOutcome, ServiceStats};
