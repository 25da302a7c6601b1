use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use url::Url;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while reading or writing persisted documents.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error on the given path
    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document content is not valid JSON for the expected shape
    #[error("Malformed JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Document exceeds the load size limit
    #[error("Document {} is too large ({size} bytes)", .path.display())]
    TooLarge { path: PathBuf, size: u64 },
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

// ============================================================================
// Feed Definitions
// ============================================================================

/// Registry bucket a feed belongs to.
///
/// Declaration order is the crawl order used by the `all` selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Specialized,
    Korean,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::General, Category::Specialized, Category::Korean];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Specialized => "specialized",
            Category::Korean => "korean",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown feed category: {0} (expected general, specialized or korean)")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(Category::General),
            "specialized" => Ok(Category::Specialized),
            "korean" => Ok(Category::Korean),
            other => Err(UnknownCategory(other.to_owned())),
        }
    }
}

/// The stored shape of one feed inside its category bucket.
///
/// `content_type` is persisted under the `category` key for compatibility
/// with existing feed files (e.g. `"tech"`, `"ai"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRecord {
    pub url: String,
    #[serde(rename = "category", default = "default_content_type")]
    pub content_type: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_update_frequency")]
    pub update_frequency: String,
}

fn default_content_type() -> String {
    "tech".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_update_frequency() -> String {
    "daily".to_string()
}

/// A feed with its registry coordinates, as handed to the validator and scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDefinition {
    pub name: String,
    pub url: String,
    pub category: Category,
    pub content_type: String,
    pub language: String,
    pub update_frequency: String,
}

impl FeedDefinition {
    /// Builds a definition with the registry's default metadata
    /// (`tech`, `en`, `daily`).
    pub fn new(name: impl Into<String>, url: impl Into<String>, category: Category) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            category,
            content_type: default_content_type(),
            language: default_language(),
            update_frequency: default_update_frequency(),
        }
    }

    pub(crate) fn from_record(category: Category, name: &str, record: &FeedRecord) -> Self {
        Self {
            name: name.to_owned(),
            url: record.url.clone(),
            category,
            content_type: record.content_type.clone(),
            language: record.language.clone(),
            update_frequency: record.update_frequency.clone(),
        }
    }

    pub(crate) fn to_record(&self) -> FeedRecord {
        FeedRecord {
            url: self.url.clone(),
            content_type: self.content_type.clone(),
            language: self.language.clone(),
            update_frequency: self.update_frequency.clone(),
        }
    }
}

/// Partial update merged into an existing feed by `FeedRegistry::update`.
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct FeedUpdate {
    pub url: Option<String>,
    pub content_type: Option<String>,
    pub language: Option<String>,
    pub update_frequency: Option<String>,
}

impl FeedUpdate {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.content_type.is_none()
            && self.language.is_none()
            && self.update_frequency.is_none()
    }
}

// ============================================================================
// Entries
// ============================================================================

/// One accepted item from a feed.
///
/// Immutable after creation. Collections of entries are ordered by
/// `published_at` descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsEntry {
    pub title: String,
    pub description: String,
    pub link: Url,
    #[serde(rename = "published")]
    pub published_at: DateTime<Utc>,
    #[serde(rename = "source")]
    pub source_feed_name: String,
    pub feed_language: String,
    pub feed_category: String,
}
