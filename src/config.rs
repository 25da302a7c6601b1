//! Configuration file parser for the crawler (`config/crawler.toml` by default).
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde, though we log a warning when
//! the file contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::{DEFAULT_EXCLUDE_KEYWORDS, DEFAULT_INCLUDE_KEYWORDS, DEFAULT_USER_AGENTS};

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

/// Top-level crawler configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Durations are stored as milliseconds to keep the TOML flat.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed registry document (category → name → definition).
    pub feeds_file: PathBuf,

    /// Per-feed performance counters.
    pub metrics_file: PathBuf,

    /// Dedup fingerprint store.
    pub hashes_file: PathBuf,

    /// Directory where crawl output collections are written.
    pub output_dir: PathBuf,

    /// Maximum number of feeds fetched at the same time.
    pub max_workers: usize,

    /// Attempts per feed before it is recorded as failed.
    pub max_retries: u32,

    /// Fixed pause between attempts.
    pub retry_delay_ms: u64,

    /// Timeout for a single feed download (request + body).
    pub request_timeout_ms: u64,

    /// Timeout for the existence probe issued by the validator.
    pub probe_timeout_ms: u64,

    /// Dedup records older than this many days are dropped on save.
    pub dedup_retention_days: i64,

    /// Upper bound on a feed body in bytes.
    pub max_feed_bytes: usize,

    /// Topic keywords; an entry must contain at least one.
    pub include_keywords: Vec<String>,

    /// Noise keywords; an entry must contain none.
    pub exclude_keywords: Vec<String>,

    /// User-Agent pool rotated round-robin across requests.
    pub user_agents: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds_file: PathBuf::from("config/rss_feeds.json"),
            metrics_file: PathBuf::from("data/metrics/feed_metrics.json"),
            hashes_file: PathBuf::from("data/metrics/news_hashes.json"),
            output_dir: PathBuf::from("data/crawled"),
            max_workers: 10,
            max_retries: 3,
            retry_delay_ms: 5_000,
            request_timeout_ms: 30_000,
            probe_timeout_ms: 30_000,
            dedup_retention_days: 30,
            max_feed_bytes: 10 * 1024 * 1024,
            include_keywords: to_strings(DEFAULT_INCLUDE_KEYWORDS),
            exclude_keywords: to_strings(DEFAULT_EXCLUDE_KEYWORDS),
            user_agents: to_strings(DEFAULT_USER_AGENTS),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 14] = [
        "feeds_file",
        "metrics_file",
        "hashes_file",
        "output_dir",
        "max_workers",
        "max_retries",
        "retry_delay_ms",
        "request_timeout_ms",
        "probe_timeout_ms",
        "dedup_retention_days",
        "max_feed_bytes",
        "include_keywords",
        "exclude_keywords",
        "user_agents",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
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
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            workers = config.max_workers,
            retries = config.max_retries,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================
