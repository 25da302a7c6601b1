//! Crawl output documents handed to downstream consumers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::storage::{save_document, NewsEntry, StorageError};

/// Shape of the written collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `NewsEntry` records as crawled
    #[default]
    Rss,
    /// Flattened [`SourcePost`] records
    Simple,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rss" => Ok(OutputFormat::Rss),
            "simple" => Ok(OutputFormat::Simple),
            other => Err(format!("unknown output format '{other}' (expected rss or simple)")),
        }
    }
}

/// One entry flattened into a single text blob for content generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePost {
    pub source_id: String,
    pub source_handle: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub origin_type: String,
}

impl From<&NewsEntry> for SourcePost {
    fn from(entry: &NewsEntry) -> Self {
        Self {
            source_id: entry.source_feed_name.clone(),
            source_handle: source_handle(&entry.source_feed_name),
            text: format!("{}\n\n{}\n\n{}", entry.title, entry.description, entry.link),
            timestamp: entry.published_at,
            origin_type: "rss".to_string(),
        }
    }
}

/// `"AI Times"` → `"ai_times"`
fn source_handle(feed_name: &str) -> String {
    feed_name.replace(' ', "_").to_lowercase()
}

pub fn to_source_posts(entries: &[NewsEntry]) -> Vec<SourcePost> {
    entries.iter().map(SourcePost::from).collect()
}

/// `ai_news_rss_YYYYMMDD.json`
pub fn output_filename(date: NaiveDate) -> String {
    format!("ai_news_rss_{}.json", date.format("%Y%m%d"))
}

/// Writes `entries` in `format` to `dir/ai_news_rss_YYYYMMDD.json`, replacing
/// any file from an earlier run on the same date.
pub fn write_output(
    dir: &Path,
    date: NaiveDate,
    entries: &[NewsEntry],
    format: OutputFormat,
) -> Result<PathBuf, StorageError> {
    let path = dir.join(output_filename(date));
    match format {
        OutputFormat::Rss => save_document(&path, entries)?,
        OutputFormat::Simple => save_document(&path, &to_source_posts(entries))?,
    }
    tracing::info!(path = %path.display(), items = entries.len(), "Wrote crawl output");
    Ok(path)
}
