//! Scan service for asminfo
//!
//! [`ScanService`] wraps an [`Engine`](asminfo_engine::Engine) and serves
//! line-delimited requests (see [`wire`]) until input closes, the context
//! budget is spent, or a fatal error occurs.
//!
//! ```ignore
//! use std::io::{self, BufReader};
//! use asminfo_executor::{ScanService, ServeOutcome};
//!
//! let service = ScanService::with_config(introspector, &config);
//! let stdin = io::stdin();
//! match service.serve(&mut BufReader::new(stdin.lock()), &mut io::stdout())? {
//!     ServeOutcome::Eof => {}
//!     ServeOutcome::Recycle => restart(),
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod service;
pub mod wire;

pub use error::{ExecutorError, Result};
pub use service::{ScanService, ServeOutcome, ServiceStats};
pub use wire::{Request, Response};
