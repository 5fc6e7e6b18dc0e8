//! The persistent scan service
//!
//! ```text
//!            ┌──────────── next line ─────────────┐
//!            ▼                                    │
//!   Idle ── Loading ── Extracting ── Responding ──┤
//!    │         │            │            │        └── recycle due → drain buffered → Recycle
//!    └─────────┴────────────┴────────────┴── fatal → Err
//! ```
//!
//! Requests are independent. A failed request is answered with an error line
//! and the loop carries on; only transport failures and fatal scan errors
//! end it early.

use std::io::{BufRead, BufReader, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use asminfo_core::{Introspector, ScanError, ScanResult};
use asminfo_engine::{Engine, ServiceConfig};
use tracing::{debug, info, info_span, warn};

use crate::error::{ExecutorError, Result};
use crate::wire::{Request, Response};

/// Why [`ScanService::serve`] returned normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// Input closed
    Eof,
    /// The process should be restarted before serving more requests
    Recycle,
}

/// Request and context counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    /// Requests received (blank lines excluded)
    pub requests: u64,
    /// Requests answered with a result
    pub succeeded: u64,
    /// Requests answered with an error
    pub failed: u64,
    /// Load contexts created
    pub contexts_created: u64,
    /// Load contexts live right now
    pub live_contexts: usize,
    /// Highest simultaneous live context count
    pub peak_live_contexts: usize,
}

/// Scan service over one [`Engine`]
///
/// `ScanService` is `Send + Sync`. [`ScanService::handle_request`] may be
/// called from many threads; [`ScanService::serve`] drives one line-based
/// transport.
#[derive(Debug)]
pub struct ScanService {
    engine: Engine,
    requests: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl ScanService {
    /// Wrap an engine
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            requests: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Build the engine from an introspector and configuration
    pub fn with_config(introspector: Arc<dyn Introspector>, config: &ServiceConfig) -> Self {
        Self::new(Engine::new(introspector, config))
    }

    /// The underlying engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Scan one module
    ///
    /// Any panic raised while loading or extracting is reported as
    /// [`ScanError::Fatal`].
    pub fn handle_request(&self, path: impl AsRef<Path>) -> std::result::Result<ScanResult, ScanError> {
        let path = path.as_ref();
        self.requests.fetch_add(1, Ordering::Relaxed);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.engine.scan(path)))
            .unwrap_or_else(|payload| Err(ScanError::Fatal(panic_message(payload.as_ref()))));

        match outcome {
            Ok(extraction) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                Ok(extraction.result)
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(path = %path.display(), code = err.error_code(), error = %err, "scan failed");
                Err(err)
            }
        }
    }

    /// Answer one wire line; `Ok(None)` for blank lines
    ///
    /// Returns the response together with the scan error, if any, so the
    /// caller can decide whether to keep serving.
    pub fn respond(&self, line: &str) -> Result<Option<(Response, Option<ScanError>)>> {
        let request = match Request::parse(line) {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(None),
            Err(ExecutorError::InvalidRequest(reason)) => {
                self.requests.fetch_add(1, Ordering::Relaxed);
                self.failed.fetch_add(1, Ordering::Relaxed);
                debug!(%reason, "rejecting request");
                return Ok(Some((Response::error(format!("invalid request: {reason}")), None)));
            }
            Err(err) => return Err(err),
        };

        Ok(Some(match self.handle_request(&request.path) {
            Ok(result) => (Response::Scan(result), None),
            Err(err) => (Response::error(&err), Some(err)),
        }))
    }

    /// Serve requests from `input` until it closes, recycling is due, or a
    /// fatal error occurs
    ///
    /// When the context budget runs out, every byte already pulled into the
    /// input buffer is still answered before returning
    /// [`ServeOutcome::Recycle`]. A partial line is read to its end first,
    /// so the replacement process always starts on a line boundary.
    pub fn serve<R: Read, W: Write>(
        &self,
        input: &mut BufReader<R>,
        output: &mut W,
    ) -> Result<ServeOutcome> {
        let span = info_span!("serve", introspector = self.engine.introspector().name());
        let _enter = span.enter();
        info!("scan service ready");

        let mut line = String::new();
        loop {
            let draining = self.engine.recycle_due();
            if draining && input.buffer().is_empty() {
                info!(stats = ?self.stats(), "context budget spent, recycling");
                return Ok(ServeOutcome::Recycle);
            }

            line.clear();
            if input.read_line(&mut line)? == 0 {
                info!(stats = ?self.stats(), "input closed");
                return Ok(ServeOutcome::Eof);
            }

            let Some((response, error)) = self.respond(&line)? else {
                continue;
            };
            writeln!(output, "{}", response.encode()?)?;
            output.flush()?;

            match error {
                Some(err) if err.is_fatal() => return Err(err.into()),
                Some(err) if err.is_exhaustion() && !draining => {
                    warn!(error = %err, "context cap exhausted, recycling");
                    return Ok(ServeOutcome::Recycle);
                }
                _ => {}
            }
        }
    }

    /// Current counters
    pub fn stats(&self) -> ServiceStats {
        let contexts = self.engine.context_stats();
        ServiceStats {
            requests: self.requests.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            contexts_created: contexts.created,
            live_contexts: contexts.live,
            peak_live_contexts: contexts.peak,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("scan panicked: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use asminfo_core::{LoadContext, LoadedModule, TypeDescriptor};
    use asminfo_engine::ContextLimits;

    /// Loads every image as an empty module, panics on `b"boom"`
    struct EmptyIntrospector;

    struct EmptyModule;

    impl LoadedModule for EmptyModule {
        fn exported_types(&self) -> Vec<Box<dyn TypeDescriptor + '_>> {
            Vec::new()
        }
    }

    impl Introspector for EmptyIntrospector {
        fn name(&self) -> &'static str {
            "empty"
        }

        fn load<'ctx>(
            &self,
            context: &'ctx LoadContext,
        ) -> std::result::Result<Box<dyn LoadedModule + 'ctx>, ScanError> {
            if context.image() == b"boom" {
                panic!("boom");
            }
            Ok(Box::new(EmptyModule))
        }
    }

    fn service() -> ScanService {
        ScanService::new(Engine::with_limits(
            Arc::new(EmptyIntrospector),
            ContextLimits::with_cap(1),
        ))
    }

    fn file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    #[test]
    fn test_handle_request_counts() {
        let service = service();
        let module = file(b"anything");
        assert!(service.handle_request(module.path()).unwrap().is_empty());
        assert!(service.handle_request("/not/here.dll").is_err());

        let stats = service.stats();
        assert_eq!((stats.requests, stats.succeeded, stats.failed), (2, 1, 1));
        assert_eq!(stats.contexts_created, 1);
        assert_eq!(stats.live_contexts, 0);
    }

    #[test]
    fn test_panic_becomes_fatal_and_releases_context() {
        let service = service();
        let module = file(b"boom");
        let err = service.handle_request(module.path()).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("boom"));
        assert_eq!(service.stats().live_contexts, 0);
    }

    #[test]
    fn test_respond_blank_and_invalid() {
        let service = service();
        assert!(service.respond("\n").unwrap().is_none());

        let (response, error) = service.respond("{oops").unwrap().unwrap();
        assert!(response.is_error());
        assert!(error.is_none());
        assert_eq!(service.stats().failed, 1);
    }

    #[test]
    fn test_serve_answers_each_line_in_order() {
        let service = service();
        let module = file(b"ok");
        let input = format!(
            "{}\n\n/not/here.dll\n{{\"path\":{}}}\n",
            module.path().display(),
            serde_json::to_string(&module.path()).unwrap()
        );

        let mut output = Vec::new();
        let outcome = service
            .serve(&mut BufReader::new(input.as_bytes()), &mut output)
            .unwrap();
        assert_eq!(outcome, ServeOutcome::Eof);

        let lines: Vec<_> = std::str::from_utf8(&output).unwrap().lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], r#"{"collection":[]}"#);
        assert!(lines[1].starts_with(r#"{"error":"failed to load module"#));
        assert_eq!(lines[2], r#"{"collection":[]}"#);
    }

    #[test]
    fn test_serve_stops_on_fatal_after_answering() {
        let service = service();
        let boom = file(b"boom");
        let ok = file(b"ok");
        let input = format!("{}\n{}\n", boom.path().display(), ok.path().display());

        let mut output = Vec::new();
        let err = service
            .serve(&mut BufReader::new(input.as_bytes()), &mut output)
            .unwrap_err();
        assert!(err.is_fatal());

        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("scan panicked"));
    }
}
