//! Scan engine: acquire context → load → extract → release

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use asminfo_core::{Introspector, ScanError};
use tracing::{debug, info, info_span};

use crate::config::ServiceConfig;
use crate::context::{ContextLimits, ContextManager, ContextStats};
use crate::extract::{extract, Extraction};

/// Runs scans against one introspector under one context manager
///
/// `Engine` is `Send + Sync`; [`Engine::scan`] may be called from many
/// threads at once. Each call gets its own context, released before the call
/// returns.
pub struct Engine {
    introspector: Arc<dyn Introspector>,
    contexts: ContextManager,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("introspector", &self.introspector.name())
            .field("contexts", &self.contexts)
            .finish()
    }
}

impl Engine {
    /// Create an engine from a service configuration
    pub fn new(introspector: Arc<dyn Introspector>, config: &ServiceConfig) -> Self {
        Self::with_limits(introspector, ContextLimits::from(config))
    }

    /// Create an engine with explicit context limits
    pub fn with_limits(introspector: Arc<dyn Introspector>, limits: ContextLimits) -> Self {
        Self {
            introspector,
            contexts: ContextManager::new(limits),
        }
    }

    /// Extract the module at `path` in a fresh context
    pub fn scan(&self, path: impl AsRef<Path>) -> Result<Extraction, ScanError> {
        let path = path.as_ref();
        let started = Instant::now();

        let lease = self.contexts.acquire(path)?;
        let span = info_span!("scan", context_id = %lease.id(), path = %path.display());
        let _enter = span.enter();

        let module = self.introspector.load(lease.context())?;
        debug!(introspector = self.introspector.name(), bytes = lease.len(), "module loaded");
        let extraction = extract(module.as_ref());
        drop(module);
        drop(lease);

        info!(
            types = extraction.result.len(),
            dropped = extraction.dropped(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan complete"
        );
        Ok(extraction)
    }

    /// The introspector in use
    pub fn introspector(&self) -> &dyn Introspector {
        self.introspector.as_ref()
    }

    /// Context counters
    pub fn context_stats(&self) -> ContextStats {
        self.contexts.stats()
    }

    /// True once the context budget for this process is spent
    pub fn recycle_due(&self) -> bool {
        self.contexts.recycle_due()
    }
}
