//! Extraction engine for asminfo
//!
//! - [`extract`]: turn a loaded module into a [`ScanResult`](asminfo_core::ScanResult),
//!   dropping types whose names cannot be resolved
//! - [`ContextManager`]: one isolated [`LoadContext`](asminfo_core::LoadContext)
//!   per request, a hard cap on live contexts, and a recycle budget
//! - [`Engine`]: the two combined behind a single `scan(path)` call
//! - [`ServiceConfig`]: defaults → TOML file → overrides

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
mod engine;
pub mod extract;

pub use config::{ConfigError, ServiceConfig, ServiceConfigBuilder};
pub use context::{ContextLease, ContextLimits, ContextManager, ContextStats};
pub use engine::Engine;
pub use extract::{extract, Extraction, TypeFailure};
