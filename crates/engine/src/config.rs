//! Service configuration
//!
//! Resolution order: built-in defaults, then an optional TOML file, then
//! explicit overrides (CLI flags). [`ServiceConfigBuilder::build`] validates
//! the result.
//!
//! ```toml
//! max_live_contexts = 4
//! acquire_timeout_ms = 30000
//! recycle_after = 10000
//! log_level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default cap on simultaneously live load contexts
pub const DEFAULT_MAX_LIVE_CONTEXTS: usize = 4;

/// Default wait for a free context slot
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Scan service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Hard cap on live load contexts
    pub max_live_contexts: usize,
    /// How long a request waits for a free context slot
    pub acquire_timeout_ms: u64,
    /// Contexts a process may create before it asks to be recycled
    pub recycle_after: Option<u64>,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_live_contexts: DEFAULT_MAX_LIVE_CONTEXTS,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            recycle_after: None,
            log_level: None,
        }
    }
}

impl ServiceConfig {
    /// Start from defaults
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Parse a TOML document; unset keys keep their defaults
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Slot wait as a duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_live_contexts == 0 {
            return Err(ConfigError::Invalid(
                "max_live_contexts must be at least 1".into(),
            ));
        }
        if self.recycle_after == Some(0) {
            return Err(ConfigError::Invalid(
                "recycle_after must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

/// Layered construction of a [`ServiceConfig`]
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Replace the current values with those read from a TOML file
    pub fn file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.config = ServiceConfig::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self)
    }

    /// Set the live-context cap
    pub fn max_live_contexts(mut self, cap: usize) -> Self {
        self.config.max_live_contexts = cap;
        self
    }

    /// Set the slot wait
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout_ms = timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        self
    }

    /// Set the per-process context budget
    pub fn recycle_after(mut self, contexts: u64) -> Self {
        self.config.recycle_after = Some(contexts);
        self
    }

    /// Set the fallback log filter
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = Some(level.into());
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<ServiceConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
