//! Load-context lifecycle
//!
//! [`ContextManager`] is the only owner of the live-context set. A request
//! obtains a [`ContextLease`] with [`ContextManager::acquire`]; the lease owns
//! the module image and releases its slot when dropped, waking one waiter.
//!
//! ```text
//! acquire(path)
//!   ├── wait while live == cap (bounded by acquire_timeout)
//!   │     └── timeout → ScanError::ResourceExhaustion
//!   ├── reserve slot (ContextId)
//!   ├── read image (slot held, lock not held)
//!   │     └── io error → release slot, ScanError::ModuleLoad
//!   └── ContextLease ── drop → release slot, notify one waiter
//! ```
//!
//! The optional recycle budget counts contexts created over the manager's
//! lifetime. Once spent, [`ContextManager::recycle_due`] turns true; the
//! service is expected to finish in-flight work and restart the process.

use std::collections::HashMap;
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use asminfo_core::{ContextId, LoadContext, ScanError};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::config::ServiceConfig;

/// Limits applied by a [`ContextManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    /// Maximum simultaneously live contexts (at least 1)
    pub cap: usize,
    /// Maximum wait for a free slot
    pub acquire_timeout: Duration,
    /// Contexts created before recycling is requested
    pub recycle_after: Option<u64>,
}

impl ContextLimits {
    /// Limits with the given cap, default timeout, no recycling
    pub fn with_cap(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            ..Self::from(&ServiceConfig::default())
        }
    }
}

impl From<&ServiceConfig> for ContextLimits {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            cap: config.max_live_contexts.max(1),
            acquire_timeout: config.acquire_timeout(),
            recycle_after: config.recycle_after,
        }
    }
}

/// Point-in-time context counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextStats {
    /// Contexts live right now
    pub live: usize,
    /// Highest simultaneous live count observed
    pub peak: usize,
    /// Contexts created since start
    pub created: u64,
}

#[derive(Debug, Default)]
struct State {
    live: HashMap<ContextId, PathBuf>,
    peak: usize,
    created: u64,
}

/// Owner of the live load-context set
#[derive(Debug)]
pub struct ContextManager {
    limits: ContextLimits,
    state: Mutex<State>,
    released: Condvar,
}

impl ContextManager {
    /// Create a manager with the given limits
    pub fn new(limits: ContextLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(State::default()),
            released: Condvar::new(),
        }
    }

    /// Configured limits
    pub fn limits(&self) -> ContextLimits {
        self.limits
    }

    /// Reserve a slot and load the image at `path` into a fresh context
    pub fn acquire(&self, path: &Path) -> Result<ContextLease<'_>, ScanError> {
        let id = self.reserve(path)?;
        match std::fs::read(path) {
            Ok(image) => {
                trace!(context_id = %id, path = %path.display(), bytes = image.len(), "context created");
                Ok(ContextLease {
                    manager: self,
                    context: LoadContext::with_id(id, path, image),
                })
            }
            Err(e) => {
                self.release(id);
                Err(ScanError::load(path.display(), describe_io(&e)))
            }
        }
    }

    fn reserve(&self, path: &Path) -> Result<ContextId, ScanError> {
        let started = Instant::now();
        let deadline = started + self.limits.acquire_timeout;
        let mut state = self.state.lock();

        while state.live.len() >= self.limits.cap {
            debug!(live = state.live.len(), cap = self.limits.cap, "waiting for a context slot");
            if self.released.wait_until(&mut state, deadline).timed_out()
                && state.live.len() >= self.limits.cap
            {
                return Err(ScanError::ResourceExhaustion {
                    live: state.live.len(),
                    cap: self.limits.cap,
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
        }

        let id = ContextId::new();
        state.live.insert(id, path.to_path_buf());
        state.created += 1;
        state.peak = state.peak.max(state.live.len());
        Ok(id)
    }

    fn release(&self, id: ContextId) {
        let mut state = self.state.lock();
        if state.live.remove(&id).is_some() {
            trace!(context_id = %id, live = state.live.len(), "context released");
            self.released.notify_one();
        }
    }

    /// Current counters
    pub fn stats(&self) -> ContextStats {
        let state = self.state.lock();
        ContextStats {
            live: state.live.len(),
            peak: state.peak,
            created: state.created,
        }
    }

    /// Contexts live right now
    pub fn live(&self) -> usize {
        self.state.lock().live.len()
    }

    /// True once the recycle budget has been spent
    pub fn recycle_due(&self) -> bool {
        match self.limits.recycle_after {
            Some(budget) => self.state.lock().created >= budget,
            None => false,
        }
    }
}

fn describe_io(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "file not found".to_string(),
        io::ErrorKind::PermissionDenied => "permission denied".to_string(),
        _ => err.to_string(),
    }
}

/// A live context; dropping it releases the slot
#[derive(Debug)]
pub struct ContextLease<'m> {
    manager: &'m ContextManager,
    context: LoadContext,
}

impl ContextLease<'_> {
    /// The leased context
    pub fn context(&self) -> &LoadContext {
        &self.context
    }
}

impl Deref for ContextLease<'_> {
    type Target = LoadContext;

    fn deref(&self) -> &LoadContext {
        &self.context
    }
}

impl Drop for ContextLease<'_> {
    fn drop(&mut self) {
        self.manager.release(self.context.id());
    }
}
