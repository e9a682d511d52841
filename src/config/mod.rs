//! TOML-based engine configuration.
//!
//! Every field has a default so an empty file (or no file) works:
//!
//! ```toml
//! max_metric_depth = 5
//! max_join_depth = 4
//!
//! [cache]
//! enabled = true
//! ttl_seconds = 300
//! max_bytes = 67108864
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Root engine configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum calculated-metric nesting depth.
    pub max_metric_depth: usize,

    /// Maximum join-path length in hops.
    pub max_join_depth: usize,

    /// Result cache settings.
    pub cache: CacheSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_metric_depth: 5,
            max_join_depth: 4,
            cache: CacheSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Result cache settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Disabling the cache makes every request execute directly.
    pub enabled: bool,

    /// Entry time-to-live in seconds; `0` disables expiry.
    pub ttl_seconds: u64,

    /// Byte budget; least-recently-used entries are evicted past it.
    pub max_bytes: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 300,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

impl CacheSettings {
    /// The TTL as a duration, `None` when expiry is disabled.
    pub fn ttl(&self) -> Option<Duration> {
        if self.ttl_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.ttl_seconds))
        }
    }
}
