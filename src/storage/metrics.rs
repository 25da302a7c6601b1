use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::document::{load_document, save_document};
use super::types::StorageError;

/// Accumulated health counters for one feed.
///
/// Counters only ever grow; they survive restarts through [`MetricsStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_response_time_ms: u64,
    pub avg_response_time_ms: f64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

impl FeedMetrics {
    /// Folds one finished crawl of the feed into the counters.
    ///
    /// The average is recomputed from the totals, never adjusted incrementally,
    /// so it always equals `total_response_time_ms / total_requests`.
    pub fn record(&mut self, success: bool, response_time: Duration, at: DateTime<Utc>) {
        let elapsed_ms = u64::try_from(response_time.as_millis()).unwrap_or(u64::MAX);

        self.total_requests = self.total_requests.saturating_add(1);
        self.total_response_time_ms = self.total_response_time_ms.saturating_add(elapsed_ms);
        self.avg_response_time_ms =
            self.total_response_time_ms as f64 / self.total_requests as f64;

        if success {
            self.successful_requests = self.successful_requests.saturating_add(1);
            self.last_success = Some(at);
        } else {
            self.failed_requests = self.failed_requests.saturating_add(1);
            self.last_failure = Some(at);
        }
    }

    /// Fraction of crawls that succeeded, or `None` before the first crawl.
    pub fn success_rate(&self) -> Option<f64> {
        (self.total_requests > 0)
            .then(|| self.successful_requests as f64 / self.total_requests as f64)
    }
}

/// Per-feed metrics keyed by feed name, persisted as one JSON document.
#[derive(Debug)]
pub struct MetricsStore {
    path: PathBuf,
    feeds: BTreeMap<String, FeedMetrics>,
}

impl MetricsStore {
    /// Loads prior metrics. A missing file is a first run, not an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let feeds = load_document(&path)?;
        Ok(Self { path, feeds })
    }

    /// An empty store that will write to `path`.
    pub fn empty(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            feeds: BTreeMap::new(),
        }
    }

    /// Full overwrite of the metrics document.
    pub fn save(&self) -> Result<(), StorageError> {
        save_document(&self.path, &self.feeds)
    }

    pub fn record(&mut self, feed: &str, success: bool, response_time: Duration, at: DateTime<Utc>) {
        self.feeds
            .entry(feed.to_owned())
            .or_default()
            .record(success, response_time, at);
    }

    pub fn get(&self, feed: &str) -> Option<&FeedMetrics> {
        self.feeds.get(feed)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeedMetrics)> {
        self.feeds.iter().map(|(name, m)| (name.as_str(), m))
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}
