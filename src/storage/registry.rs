//! Named feed definitions grouped by category, persisted as one JSON document.
//!
//! The document is a nested mapping `category → name → record`:
//!
//! ```json
//! {
//!   "general": {
//!     "TechCrunch AI": {
//!       "url": "https://techcrunch.com/category/artificial-intelligence/feed/",
//!       "category": "tech",
//!       "language": "en",
//!       "update_frequency": "daily"
//!     }
//!   }
//! }
//! ```
//!
//! Every mutation is written to disk before the method returns.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::document::{load_document, save_document};
use super::types::{Category, FeedDefinition, FeedRecord, FeedUpdate, StorageError};

type RegistryDocument = BTreeMap<Category, BTreeMap<String, FeedRecord>>;

/// Owner of all feed definitions. Unique by `(category, name)`.
#[derive(Debug)]
pub struct FeedRegistry {
    path: PathBuf,
    feeds: RegistryDocument,
}

impl FeedRegistry {
    /// Reads the registry document at `path`.
    ///
    /// An absent file yields an empty registry; a malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let feeds: RegistryDocument = load_document(&path)?;
        let registry = Self { path, feeds };
        tracing::info!(
            path = %registry.path.display(),
            feeds = registry.len(),
            "Loaded feed registry"
        );
        Ok(registry)
    }

    /// Writes the full registry document.
    pub fn save(&self) -> Result<(), StorageError> {
        save_document(&self.path, &self.feeds)?;
        tracing::debug!(path = %self.path.display(), "Saved feed registry");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts or overwrites a feed, creating its category bucket if needed.
    pub fn add(&mut self, feed: FeedDefinition) -> Result<(), StorageError> {
        let record = feed.to_record();
        self.feeds
            .entry(feed.category)
            .or_default()
            .insert(feed.name.clone(), record);
        self.save()?;
        tracing::info!(
            feed = %feed.name,
            url = %feed.url,
            category = %feed.category,
            "Added feed"
        );
        Ok(())
    }

    /// Removes a feed by name.
    ///
    /// With a category, only that bucket is searched. Without one, the first
    /// bucket (in category order) holding the name loses it. Returns the
    /// category the feed was removed from, or `None` when nothing matched.
    pub fn remove(
        &mut self,
        name: &str,
        category: Option<Category>,
    ) -> Result<Option<Category>, StorageError> {
        let found = match category {
            Some(cat) => self
                .feeds
                .get(&cat)
                .filter(|bucket| bucket.contains_key(name))
                .map(|_| cat),
            None => self
                .feeds
                .iter()
                .find(|(_, bucket)| bucket.contains_key(name))
                .map(|(cat, _)| *cat),
        };

        let Some(cat) = found else {
            tracing::warn!(feed = %name, category = ?category, "Feed not found, nothing removed");
            return Ok(None);
        };

        if let Some(bucket) = self.feeds.get_mut(&cat) {
            bucket.remove(name);
        }
        self.save()?;
        tracing::info!(feed = %name, category = %cat, "Removed feed");
        Ok(Some(cat))
    }

    /// Merges `changes` into an existing feed.
    ///
    /// Returns `false` (and writes nothing) if the feed is absent.
    pub fn update(
        &mut self,
        name: &str,
        category: Category,
        changes: FeedUpdate,
    ) -> Result<bool, StorageError> {
        let Some(record) = self
            .feeds
            .get_mut(&category)
            .and_then(|bucket| bucket.get_mut(name))
        else {
            tracing::warn!(feed = %name, category = %category, "Feed not found, nothing updated");
            return Ok(false);
        };

        if let Some(url) = changes.url {
            record.url = url;
        }
        if let Some(content_type) = changes.content_type {
            record.content_type = content_type;
        }
        if let Some(language) = changes.language {
            record.language = language;
        }
        if let Some(update_frequency) = changes.update_frequency {
            record.update_frequency = update_frequency;
        }

        self.save()?;
        tracing::info!(feed = %name, category = %category, "Updated feed");
        Ok(true)
    }

    /// Rewrites a stored URL in memory only. Callers persist with [`save`](Self::save).
    ///
    /// Used by the validator, which batches redirect updates into one write.
    pub fn set_url(&mut self, category: Category, name: &str, url: &str) -> bool {
        match self
            .feeds
            .get_mut(&category)
            .and_then(|bucket| bucket.get_mut(name))
        {
            Some(record) => {
                record.url = url.to_owned();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, category: Category, name: &str) -> Option<FeedDefinition> {
        self.feeds
            .get(&category)
            .and_then(|bucket| bucket.get(name))
            .map(|record| FeedDefinition::from_record(category, name, record))
    }

    /// All feeds in one category, ordered by name.
    pub fn feeds(&self, category: Category) -> Vec<FeedDefinition> {
        self.feeds
            .get(&category)
            .map(|bucket| {
                bucket
                    .iter()
                    .map(|(name, record)| FeedDefinition::from_record(category, name, record))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every feed, in category order then name order.
    pub fn iter(&self) -> impl Iterator<Item = FeedDefinition> + '_ {
        self.feeds.iter().flat_map(|(category, bucket)| {
            bucket
                .iter()
                .map(move |(name, record)| FeedDefinition::from_record(*category, name, record))
        })
    }

    /// Categories that have a bucket, including empty buckets.
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.feeds.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.feeds.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scratch_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "feedcrawl_registry_{name}_{}",
            std::process::id()
        ));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("rss_feeds.json")
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_load_missing_is_empty() {
        let path = scratch_path("missing");
        let registry = FeedRegistry::load(&path).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.categories().count(), 0);
        cleanup(&path);
    }

    #[test]
    fn test_add_persists_immediately() {
        let path = scratch_path("add");
        let mut registry = FeedRegistry::load(&path).unwrap();

        registry
            .add(FeedDefinition::new(
                "Example",
                "https://example.com/rss",
                Category::Specialized,
            ))
            .unwrap();

        let reloaded = FeedRegistry::load(&path).unwrap();
        let feed = reloaded.get(Category::Specialized, "Example").unwrap();
        assert_eq!(feed.url, "https://example.com/rss");
        assert_eq!(feed.content_type, "tech");
        assert_eq!(feed.language, "en");
        assert_eq!(feed.update_frequency, "daily");
        cleanup(&path);
    }

    #[test]
    fn test_add_overwrites_same_name() {
        let path = scratch_path("overwrite");
        let mut registry = FeedRegistry::load(&path).unwrap();

        registry
            .add(FeedDefinition::new("Feed", "https://a.example/rss", Category::General))
            .unwrap();
        registry
            .add(FeedDefinition::new("Feed", "https://b.example/rss", Category::General))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(Category::General, "Feed").unwrap().url,
            "https://b.example/rss"
        );
        cleanup(&path);
    }

    #[test]
    fn test_same_name_in_two_categories_is_two_feeds() {
        let path = scratch_path("two_buckets");
        let mut registry = FeedRegistry::load(&path).unwrap();

        registry
            .add(FeedDefinition::new("Feed", "https://a.example/rss", Category::General))
            .unwrap();
        registry
            .add(FeedDefinition::new("Feed", "https://b.example/rss", Category::Korean))
            .unwrap();

        assert_eq!(registry.len(), 2);
        cleanup(&path);
    }

    #[test]
    fn test_remove_with_category_only_touches_that_bucket() {
        let path = scratch_path("remove_cat");
        let mut registry = FeedRegistry::load(&path).unwrap();
        registry
            .add(FeedDefinition::new("Feed", "https://a.example/rss", Category::General))
            .unwrap();

        let removed = registry.remove("Feed", Some(Category::Korean)).unwrap();
        assert_eq!(removed, None);
        assert_eq!(registry.len(), 1);

        let removed = registry.remove("Feed", Some(Category::General)).unwrap();
        assert_eq!(removed, Some(Category::General));
        assert!(FeedRegistry::load(&path).unwrap().is_empty());
        cleanup(&path);
    }

    #[test]
    fn test_remove_without_category_takes_first_match() {
        let path = scratch_path("remove_any");
        let mut registry = FeedRegistry::load(&path).unwrap();
        registry
            .add(FeedDefinition::new("Feed", "https://a.example/rss", Category::Specialized))
            .unwrap();
        registry
            .add(FeedDefinition::new("Feed", "https://b.example/rss", Category::Korean))
            .unwrap();

        let removed = registry.remove("Feed", None).unwrap();
        assert_eq!(removed, Some(Category::Specialized));
        assert!(registry.get(Category::Korean, "Feed").is_some());
        cleanup(&path);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let path = scratch_path("remove_missing");
        let mut registry = FeedRegistry::load(&path).unwrap();
        assert_eq!(registry.remove("Ghost", None).unwrap(), None);
        // Nothing was written
        assert!(!path.exists());
        cleanup(&path);
    }

    #[test]
    fn test_update_merges_fields() {
        let path = scratch_path("update");
        let mut registry = FeedRegistry::load(&path).unwrap();
        registry
            .add(FeedDefinition::new("Feed", "https://a.example/rss", Category::General))
            .unwrap();

        let updated = registry
            .update(
                "Feed",
                Category::General,
                FeedUpdate {
                    language: Some("ko".to_string()),
                    ..FeedUpdate::default()
                },
            )
            .unwrap();
        assert!(updated);

        let feed = FeedRegistry::load(&path)
            .unwrap()
            .get(Category::General, "Feed")
            .unwrap();
        assert_eq!(feed.language, "ko");
        assert_eq!(feed.url, "https://a.example/rss");
        cleanup(&path);
    }

    #[test]
    fn test_update_missing_is_noop() {
        let path = scratch_path("update_missing");
        let mut registry = FeedRegistry::load(&path).unwrap();
        let updated = registry
            .update("Ghost", Category::General, FeedUpdate::default())
            .unwrap();
        assert!(!updated);
        cleanup(&path);
    }

    #[test]
    fn test_reads_existing_document_shape() {
        let path = scratch_path("shape");
        std::fs::write(
            &path,
            r#"{
  "korean": {
    "AI Times": {"url": "https://www.aitimes.com/rss", "category": "ai", "language": "ko", "update_frequency": "hourly"}
  },
  "general": {}
}"#,
        )
        .unwrap();

        let registry = FeedRegistry::load(&path).unwrap();
        let feeds: Vec<_> = registry.iter().collect();
        assert_eq!(
            feeds,
            vec![FeedDefinition {
                name: "AI Times".to_string(),
                url: "https://www.aitimes.com/rss".to_string(),
                category: Category::Korean,
                content_type: "ai".to_string(),
                language: "ko".to_string(),
                update_frequency: "hourly".to_string(),
            }]
        );
        assert_eq!(
            registry.categories().collect::<Vec<_>>(),
            vec![Category::General, Category::Korean]
        );
        cleanup(&path);
    }

    #[test]
    fn test_unknown_category_is_malformed() {
        let path = scratch_path("unknown_cat");
        std::fs::write(&path, r#"{"sports": {}}"#).unwrap();
        assert!(matches!(
            FeedRegistry::load(&path),
            Err(StorageError::Json { .. })
        ));
        cleanup(&path);
    }

    #[test]
    fn test_set_url_does_not_persist() {
        let path = scratch_path("set_url");
        let mut registry = FeedRegistry::load(&path).unwrap();
        registry
            .add(FeedDefinition::new("Feed", "https://a.example/rss", Category::General))
            .unwrap();

        assert!(registry.set_url(Category::General, "Feed", "https://b.example/rss"));
        assert!(!registry.set_url(Category::General, "Ghost", "https://b.example/rss"));

        let on_disk = FeedRegistry::load(&path).unwrap();
        assert_eq!(
            on_disk.get(Category::General, "Feed").unwrap().url,
            "https://a.example/rss"
        );
        cleanup(&path);
    }
}
