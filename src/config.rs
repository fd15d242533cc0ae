//! Configuration file parser for `blogsync.toml`.
//!
//! The config file is optional; a missing file yields `Config::default()`,
//! which has no catalog URLs and therefore skips every category. Unknown keys
//! are ignored by serde, but we log a warning so typos are noticed.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::catalog::{CatalogSources, FetcherOptions, DEFAULT_RECONCILE_CONCURRENCY};
use crate::feed::PollerOptions;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding the blog registry.
    pub database_path: String,

    /// Minutes between refresh cycles in watch mode. 0 = run once.
    pub refresh_interval_minutes: u64,

    /// Limit for every catalog and feed request.
    pub request_timeout_secs: u64,

    /// Catalog entries validated and stored at once.
    pub reconcile_concurrency: usize,

    /// Feeds polled at once across all blogs.
    pub poller_concurrency: usize,

    /// Catalog URL per category.
    pub catalogs: CatalogSources,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "blogsync.db".to_string(),
            refresh_interval_minutes: 60,
            request_timeout_secs: 30,
            reconcile_concurrency: DEFAULT_RECONCILE_CONCURRENCY,
            poller_concurrency: 10,
            catalogs: CatalogSources::default(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "database_path",
        "refresh_interval_minutes",
        "request_timeout_secs",
        "reconcile_concurrency",
        "poller_concurrency",
        "catalogs",
    ];

    const KNOWN_CATALOG_KEYS: [&'static str; 3] = ["personal", "company", "video"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading so a corrupted file can't exhaust memory.
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

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw, &Self::KNOWN_KEYS, "");
            if let Some(toml::Value::Table(catalogs)) = raw.get("catalogs") {
                warn_unknown_keys(catalogs, &Self::KNOWN_CATALOG_KEYS, "catalogs.");
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            path = %path.display(),
            database = %config.database_path,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Interval between watch-mode refreshes, or `None` for a single run.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_minutes > 0)
            .then(|| Duration::from_secs(self.refresh_interval_minutes * 60))
    }

    pub fn fetcher_options(&self) -> FetcherOptions {
        FetcherOptions {
            timeout: self.request_timeout(),
            reconcile_concurrency: self.reconcile_concurrency.max(1),
        }
    }

    pub fn poller_options(&self) -> PollerOptions {
        PollerOptions {
            max_concurrent: self.poller_concurrency.max(1),
            timeout: self.request_timeout(),
            ..PollerOptions::default()
        }
    }
}

fn warn_unknown_keys(table: &toml::Table, known: &[&str], prefix: &str) {
    for key in table.keys() {
        if !known.contains(&key.as_str()) {
            tracing::warn!(key = %format!("{prefix}{key}"), "Unknown key in config file, ignoring");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
