//! Configuration file parser for the feed server.
//!
//! The config file is optional: without `--config` the defaults apply. A file
//! that is named but missing is an error.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::util::{validate_url, UrlValidationError};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid feed_url: {0}")]
    InvalidUrl(#[from] UrlValidationError),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level server configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Socket address the HTTP server listens on.
    pub bind_address: String,

    /// Upstream RSS feed.
    pub feed_url: String,

    /// In-process snapshot TTL, also advertised as `s-maxage`.
    pub cache_ttl_secs: u64,

    /// `max-age` hint sent upstream to caching intermediaries.
    pub revalidate_secs: u64,

    /// `stale-while-revalidate` window advertised on fresh responses.
    pub stale_while_revalidate_secs: u64,

    /// Timeout for the whole upstream request, body included.
    pub fetch_timeout_secs: u64,

    /// Maximum accepted upstream body size in bytes.
    pub max_feed_bytes: usize,

    /// Share one in-flight refresh between concurrent cache misses.
    pub single_flight: bool,

    /// Permit feed URLs on localhost or private networks.
    pub allow_private_upstream: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            feed_url: "https://medium.com/feed/@reelzila".to_string(),
            cache_ttl_secs: 300,
            revalidate_secs: 300,
            stale_while_revalidate_secs: 60,
            fetch_timeout_secs: 10,
            max_feed_bytes: 10 * 1024 * 1024,
            single_flight: true,
            allow_private_upstream: false,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "bind_address",
        "feed_url",
        "cache_ttl_secs",
        "revalidate_secs",
        "stale_while_revalidate_secs",
        "fetch_timeout_secs",
        "max_feed_bytes",
        "single_flight",
        "allow_private_upstream",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Err(ConfigError::Io)` (the path was asked for explicitly)
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid loading a corrupted giant file
        let meta = std::fs::metadata(path)?;
        if meta.len() > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "Config file is {} bytes (max {} bytes)",
                meta.len(),
                Self::MAX_FILE_SIZE
            )));
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text. Empty text yields defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(feed_url = %config.feed_url, bind = %config.bind_address, "Loaded configuration");
        Ok(config)
    }

    /// Checks values that would make the server misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allow_private_upstream {
            let url = url::Url::parse(&self.feed_url).map_err(UrlValidationError::from)?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(UrlValidationError::UnsupportedScheme(url.scheme().to_owned()).into());
            }
        } else {
            validate_url(&self.feed_url)?;
        }

        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "cache_ttl_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "fetch_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_feed_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_feed_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                key: "bind_address",
                reason: format!("'{}' is not a socket address", self.bind_address),
            });
        }

        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn revalidate(&self) -> Duration {
        Duration::from_secs(self.revalidate_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// `Cache-Control` value attached to fresh and freshly refreshed responses.
    pub fn cache_control(&self) -> String {
        format!(
            "public, s-maxage={}, stale-while-revalidate={}",
            self.cache_ttl_secs, self.stale_while_revalidate_secs
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
