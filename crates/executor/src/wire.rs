//! Line-oriented wire format
//!
//! One request per line. A line is a JSON string, a JSON object with a
//! `path` member, or a bare path. Blank lines carry no request.
//!
//! ```text
//! "lib/A.dll"            -> scan lib/A.dll
//! {"path":"lib/B.dll"}   -> scan lib/B.dll
//! lib/C.dll              -> scan lib/C.dll
//! ```
//!
//! Every request is answered with exactly one compact JSON line: the
//! [`ScanResult`] document, or `{"error":"<reason>"}`.

use std::path::PathBuf;

use asminfo_core::ScanResult;
use serde::{Deserialize, Serialize};

use crate::error::{ExecutorError, Result};

/// A decoded scan request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    /// Module to scan
    pub path: PathBuf,
}

impl Request {
    /// Request a scan of `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Decode one line; `Ok(None)` for blank lines
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let request = if line.starts_with('"') {
            let path: String = serde_json::from_str(line)
                .map_err(|e| ExecutorError::InvalidRequest(e.to_string()))?;
            Request::new(path)
        } else if line.starts_with('{') {
            serde_json::from_str(line).map_err(|e| ExecutorError::InvalidRequest(e.to_string()))?
        } else {
            Request::new(line)
        };

        if request.path.as_os_str().is_empty() {
            return Err(ExecutorError::InvalidRequest("empty path".into()));
        }
        Ok(Some(request))
    }
}

/// A response line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// Extraction result
    Scan(ScanResult),
    /// Request failed
    Error {
        /// Human-readable reason
        error: String,
    },
}

impl Response {
    /// Error response carrying `reason`
    pub fn error(reason: impl ToString) -> Self {
        Response::Error {
            error: reason.to_string(),
        }
    }

    /// True for error responses
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// Compact single-line JSON
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asminfo_core::{IdentTy, TypeRecord};

    // ========================================================================
    // Requests
    // ========================================================================

    #[test]
    fn test_parse_json_string() {
        let request = Request::parse(r#""lib/A.dll""#).unwrap().unwrap();
        assert_eq!(request.path, PathBuf::from("lib/A.dll"));
    }

    #[test]
    fn test_parse_escaped_json_string() {
        let request = Request::parse(r#""C:\\mods\\A.dll""#).unwrap().unwrap();
        assert_eq!(request.path, PathBuf::from(r"C:\mods\A.dll"));
    }

    #[test]
    fn test_parse_object() {
        let request = Request::parse(r#"{"path": "lib/B.dll"}"#).unwrap().unwrap();
        assert_eq!(request, Request::new("lib/B.dll"));
    }

    #[test]
    fn test_parse_bare_path_trims_whitespace() {
        let request = Request::parse("  lib/C.dll \r").unwrap().unwrap();
        assert_eq!(request, Request::new("lib/C.dll"));
    }

    #[test]
    fn test_blank_lines_carry_no_request() {
        assert_eq!(Request::parse("").unwrap(), None);
        assert_eq!(Request::parse("   \t").unwrap(), None);
    }

    #[test]
    fn test_malformed_requests() {
        for line in [r#""unterminated"#, r#"{"file": "x"}"#, "{", r#""""#, r#"{"path": ""}"#] {
            let err = Request::parse(line).unwrap_err();
            assert!(
                matches!(err, ExecutorError::InvalidRequest(_)),
                "{line}: {err:?}"
            );
        }
    }

    // ========================================================================
    // Responses
    // ========================================================================

    #[test]
    fn test_scan_response_is_the_bare_document() {
        let mut result = ScanResult::new();
        let mut record = TypeRecord::new("Foo", Some("Foo".into()));
        record.fields.push(IdentTy::new("x", "Int32"));
        result.push(record);

        assert_eq!(
            Response::Scan(result.clone()).encode().unwrap(),
            result.to_json().unwrap()
        );
    }

    #[test]
    fn test_error_response() {
        let response = Response::error("failed to load module 'x': file not found");
        assert!(response.is_error());
        assert_eq!(
            response.encode().unwrap(),
            r#"{"error":"failed to load module 'x': file not found"}"#
        );
    }

    #[test]
    fn test_responses_are_single_line() {
        let response = Response::error("line one\nline two");
        assert!(!response.encode().unwrap().contains('\n'));
    }
}
