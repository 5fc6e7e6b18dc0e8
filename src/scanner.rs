//! Main entry point for asminfo.
//!
//! This module provides the `Scanner` struct, the primary entry point for
//! all extraction operations.

use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use asminfo_core::{Introspector, ScanResult};
use asminfo_engine::{Extraction, ServiceConfig, ServiceConfigBuilder};
use asminfo_executor::{ScanService, ServeOutcome, ServiceStats};
use asminfo_metadata::ClrIntrospector;

use crate::error::Result;

/// The asminfo scanner.
///
/// Every scan runs in its own load context; scans may be issued from many
/// threads at once. Create one with [`Scanner::new`] or [`Scanner::builder`].
///
/// # Example
///
/// ```ignore
/// use asminfo::prelude::*;
///
/// let scanner = Scanner::new();
/// let result = scanner.scan("bin/Foo.dll")?;
/// println!("{}", result.to_json()?);
/// ```
#[derive(Debug)]
pub struct Scanner {
    service: ScanService,
}

impl Scanner {
    /// A scanner for ECMA-335 modules with default limits.
    pub fn new() -> Self {
        Self {
            service: ScanService::with_config(
                Arc::new(ClrIntrospector::new()),
                &ServiceConfig::default(),
            ),
        }
    }

    /// Start configuring a scanner.
    pub fn builder() -> ScannerBuilder {
        ScannerBuilder::new()
    }

    /// Extract the module at `path`.
    pub fn scan(&self, path: impl AsRef<Path>) -> Result<ScanResult> {
        Ok(self.service.handle_request(path)?)
    }

    /// Extract the module at `path` and encode the result as compact JSON.
    pub fn scan_json(&self, path: impl AsRef<Path>) -> Result<String> {
        Ok(self.scan(path)?.to_json()?)
    }

    /// Extract the module at `path`, keeping the list of dropped types.
    pub fn scan_detailed(&self, path: impl AsRef<Path>) -> Result<Extraction> {
        Ok(self.service.engine().scan(path)?)
    }

    /// Serve line-delimited requests until input closes or recycling is due.
    pub fn serve<R: Read, W: Write>(
        &self,
        input: &mut BufReader<R>,
        output: &mut W,
    ) -> Result<ServeOutcome> {
        Ok(self.service.serve(input, output)?)
    }

    /// Request and context counters.
    pub fn stats(&self) -> ServiceStats {
        self.service.stats()
    }

    /// True once the configured context budget has been spent.
    pub fn recycle_due(&self) -> bool {
        self.service.engine().recycle_due()
    }

    /// The underlying service.
    pub fn service(&self) -> &ScanService {
        &self.service
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for scanner configuration.
///
/// # Example
///
/// ```ignore
/// let scanner = Scanner::builder()
///     .config_file("asminfo.toml")?
///     .max_live_contexts(2)
///     .recycle_after(10_000)
///     .build()?;
/// ```
pub struct ScannerBuilder {
    config: ServiceConfigBuilder,
    introspector: Option<Arc<dyn Introspector>>,
}

impl ScannerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::builder(),
            introspector: None,
        }
    }

    /// Load settings from a TOML file; later calls override them.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.config = self.config.file(path)?;
        Ok(self)
    }

    /// Cap simultaneously live load contexts.
    pub fn max_live_contexts(mut self, cap: usize) -> Self {
        self.config = self.config.max_live_contexts(cap);
        self
    }

    /// Bound the wait for a free load context.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.acquire_timeout(timeout);
        self
    }

    /// Report [`Scanner::recycle_due`] after this many load contexts.
    pub fn recycle_after(mut self, contexts: u64) -> Self {
        self.config = self.config.recycle_after(contexts);
        self
    }

    /// Use a different type system introspector.
    pub fn introspector(mut self, introspector: Arc<dyn Introspector>) -> Self {
        self.introspector = Some(introspector);
        self
    }

    /// Validate the configuration and build the scanner.
    pub fn build(self) -> Result<Scanner> {
        let config = self.config.build()?;
        let introspector = self
            .introspector
            .unwrap_or_else(|| Arc::new(ClrIntrospector::new()));
        Ok(Scanner {
            service: ScanService::with_config(introspector, &config),
        })
    }
}

impl Default for ScannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
