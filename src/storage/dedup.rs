use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::document::{load_document, save_document};
use super::types::{NewsEntry, StorageError};

/// Default rolling retention window for fingerprints.
///
/// A record survives while it is strictly younger than this many days; one
/// first seen exactly `DEFAULT_RETENTION_DAYS` days ago is purged.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// What the store remembers about an emitted entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRecord {
    #[serde(rename = "date")]
    pub first_seen: NaiveDate,
    pub title: String,
}

/// Deterministic content fingerprint over `(title, link, published_at)`.
///
/// The three parts are concatenated without separators and hashed with SHA-256.
pub fn fingerprint(entry: &NewsEntry) -> String {
    let input = format!(
        "{}{}{}",
        entry.title,
        entry.link,
        entry.published_at.to_rfc3339()
    );
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// Fingerprint set with a rolling retention window.
///
/// Records are only evicted when the store is saved; membership checks never
/// look at record age.
#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    retention_days: i64,
    records: HashMap<String, DedupRecord>,
}

impl DedupStore {
    /// Loads prior fingerprints. A missing file is a first run, not an error.
    pub fn load(path: impl AsRef<Path>, retention_days: i64) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let records = load_document(&path)?;
        Ok(Self {
            path,
            retention_days,
            records,
        })
    }

    /// An empty store that will write to `path`.
    pub fn empty(path: impl AsRef<Path>, retention_days: i64) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            retention_days,
            records: HashMap::new(),
        }
    }

    /// Check-and-set: returns `true` if the entry was already seen.
    ///
    /// A first sighting is recorded with `today` as its date and returns `false`.
    /// A repeat sighting leaves the existing record untouched.
    pub fn is_duplicate_and_record(&mut self, entry: &NewsEntry, today: NaiveDate) -> bool {
        let key = fingerprint(entry);
        if self.records.contains_key(&key) {
            return true;
        }
        self.records.insert(
            key,
            DedupRecord {
                first_seen: today,
                title: entry.title.clone(),
            },
        );
        false
    }

    pub fn contains(&self, entry: &NewsEntry) -> bool {
        self.records.contains_key(&fingerprint(entry))
    }

    /// Drops records first seen `days` or more days before `today`.
    ///
    /// Returns the number of records removed.
    pub fn purge_older_than(&mut self, days: i64, today: NaiveDate) -> usize {
        let cutoff = today - Duration::days(days);
        let before = self.records.len();
        self.records.retain(|_, record| record.first_seen > cutoff);
        before - self.records.len()
    }

    /// Purges expired records, then overwrites the document.
    pub fn save(&mut self, today: NaiveDate) -> Result<(), StorageError> {
        let purged = self.purge_older_than(self.retention_days, today);
        if purged > 0 {
            tracing::debug!(purged, remaining = self.records.len(), "Purged old fingerprints");
        }
        save_document(&self.path, &self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
