//! Configuration file parser for ~/.config/feedkeep/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields`
//! off) so older binaries tolerate newer config files.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::FetchLimits;
use crate::util::UrlPolicy;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file path. Defaults to `<config dir>/sources.db` when unset.
    pub db_path: Option<PathBuf>,

    /// Per-fetch timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Maximum feed response size in bytes.
    pub max_response_bytes: usize,

    /// User-Agent header sent with feed requests.
    pub user_agent: String,

    /// Permit fetching from loopback/private addresses (self-hosted feeds).
    pub allow_private_hosts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            fetch_timeout_secs: 30,
            max_response_bytes: 10 * 1024 * 1024,
            user_agent: concat!("feedkeep/", env!("CARGO_PKG_VERSION")).to_string(),
            allow_private_hosts: false,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior)
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid buffering a corrupted or
        // maliciously large config file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// The fetch bounds this configuration describes.
    pub fn fetch_limits(&self) -> FetchLimits {
        FetchLimits {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_bytes: self.max_response_bytes,
        }
    }

    /// The URL validation policy this configuration describes.
    pub fn url_policy(&self) -> UrlPolicy {
        UrlPolicy {
            allow_private_hosts: self.allow_private_hosts,
        }
    }
}
