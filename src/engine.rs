//! The crawl engine: one owned struct holding the registry, metrics and dedup
//! store for a process run.
//!
//! A crawl cycle validates the registry, fans one task per valid feed out over
//! a bounded pool, merges the accepted entries newest-first and persists the
//! metrics and dedup documents. Individual feed failures never fail the cycle.

use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use reqwest::redirect::Policy;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::feed::{
    crawl_feed, select_entries, validate_all, DateWindow, KeywordClassifier, RetryPolicy,
    UserAgentPool, ValidationReport,
};
use crate::storage::{
    quarantine_document, Category, DedupStore, FeedDefinition, FeedMetrics, FeedRegistry,
    MetricsStore, NewsEntry, StorageError, UnknownCategory,
};

// ============================================================================
// Error Types
// ============================================================================

/// Setup failures. Once an engine exists, crawling itself does not fail.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to load feed registry: {0}")]
    Registry(#[source] StorageError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

// ============================================================================
// Feed Selection
// ============================================================================

/// Which registry buckets a crawl covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSelector {
    All,
    Category(Category),
}

impl FeedSelector {
    /// Categories in crawl order. `All` walks general, specialized, korean.
    pub fn categories(self) -> Vec<Category> {
        match self {
            FeedSelector::All => Category::ALL.to_vec(),
            FeedSelector::Category(category) => vec![category],
        }
    }
}

impl FromStr for FeedSelector {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(FeedSelector::All)
        } else {
            s.parse().map(FeedSelector::Category)
        }
    }
}

// ============================================================================
// HTTP Client
// ============================================================================

const MAX_REDIRECTS: usize = 10;

fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("Too many redirects");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev == url) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Shared client for probes and downloads. Per-request timeouts are applied by
/// the callers, so the client itself carries none.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(redirect_policy())
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
}

// ============================================================================
// Engine
// ============================================================================

pub struct CrawlEngine {
    config: Config,
    client: reqwest::Client,
    registry: FeedRegistry,
    metrics: Mutex<MetricsStore>,
    dedup: Mutex<DedupStore>,
    agents: UserAgentPool,
    classifier: KeywordClassifier,
    policy: RetryPolicy,
}

impl CrawlEngine {
    /// Loads every store named by `config`.
    ///
    /// A missing or unreadable registry is fatal. Metrics and dedup documents
    /// that fail to load are logged and replaced by empty stores.
    pub fn open(config: Config) -> Result<Self, EngineError> {
        let registry = FeedRegistry::load(&config.feeds_file).map_err(EngineError::Registry)?;

        let metrics = recover_store(
            "metrics",
            &config.metrics_file,
            MetricsStore::load(&config.metrics_file),
            || MetricsStore::empty(&config.metrics_file),
        );

        let dedup = recover_store(
            "fingerprints",
            &config.hashes_file,
            DedupStore::load(&config.hashes_file, config.dedup_retention_days),
            || DedupStore::empty(&config.hashes_file, config.dedup_retention_days),
        );

        tracing::info!(
            feeds = registry.len(),
            metrics = metrics.len(),
            fingerprints = dedup.len(),
            "Crawl engine ready"
        );

        Ok(Self {
            client: build_client()?,
            agents: UserAgentPool::new(config.user_agents.clone()),
            classifier: KeywordClassifier::new(&config.include_keywords, &config.exclude_keywords),
            policy: RetryPolicy {
                max_retries: config.max_retries,
                retry_delay: config.retry_delay(),
                request_timeout: config.request_timeout(),
                max_body_bytes: config.max_feed_bytes,
            },
            metrics: Mutex::new(metrics),
            dedup: Mutex::new(dedup),
            registry,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &FeedRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FeedRegistry {
        &mut self.registry
    }

    /// Current counters for one feed.
    pub async fn feed_metrics(&self, name: &str) -> Option<FeedMetrics> {
        self.metrics.lock().await.get(name).cloned()
    }

    /// Probes every registered feed, healing redirected URLs in the registry.
    pub async fn validate(&mut self) -> ValidationReport {
        validate_all(
            &mut self.registry,
            &self.client,
            &self.agents,
            self.config.probe_timeout(),
            self.config.max_workers,
        )
        .await
    }

    /// Runs one crawl cycle against the current time.
    pub async fn crawl(
        &mut self,
        selector: FeedSelector,
        max_items_per_feed: Option<usize>,
    ) -> Vec<NewsEntry> {
        self.crawl_at(selector, max_items_per_feed, Utc::now()).await
    }

    /// Runs one crawl cycle as if the clock read `now`.
    ///
    /// Only feeds the validator reports as valid are fetched, in selector
    /// category order.
    pub async fn crawl_at(
        &mut self,
        selector: FeedSelector,
        max_items_per_feed: Option<usize>,
        now: DateTime<Utc>,
    ) -> Vec<NewsEntry> {
        let report = self.validate().await;

        let feeds: Vec<FeedDefinition> = selector
            .categories()
            .into_iter()
            .flat_map(|category| self.registry.feeds(category))
            .filter(|feed| report.is_valid(feed.category, &feed.name))
            .collect();

        self.crawl_feeds(feeds, max_items_per_feed, now).await
    }

    /// Fetches the given feeds without validating them first.
    ///
    /// At most `max_workers` feeds are in flight at once. After every task has
    /// finished, metrics and fingerprints are saved; save failures are logged.
    pub async fn crawl_feeds(
        &self,
        feeds: Vec<FeedDefinition>,
        max_items_per_feed: Option<usize>,
        now: DateTime<Utc>,
    ) -> Vec<NewsEntry> {
        let window = DateWindow::yesterday(now);
        let feed_count = feeds.len();

        tracing::info!(
            feeds = feed_count,
            window_start = %window.start,
            window_end = %window.end,
            "Starting crawl cycle"
        );

        let batches: Vec<Vec<NewsEntry>> = stream::iter(feeds)
            .map(|feed| {
                let window = &window;
                async move { self.crawl_one(feed, window, max_items_per_feed, now).await }
            })
            .buffer_unordered(self.config.max_workers.max(1))
            .collect()
            .await;

        let entries = merge_sorted(batches);
        let today = now.date_naive();
        self.persist(today).await;

        tracing::info!(
            feeds = feed_count,
            entries = entries.len(),
            "Crawl cycle complete"
        );

        entries
    }

    /// Fetch → metrics → filter → dedup for one feed.
    async fn crawl_one(
        &self,
        feed: FeedDefinition,
        window: &DateWindow,
        max_items: Option<usize>,
        now: DateTime<Utc>,
    ) -> Vec<NewsEntry> {
        let outcome = crawl_feed(&self.client, &feed, &self.policy, &self.agents, now).await;

        self.metrics
            .lock()
            .await
            .record(&feed.name, outcome.is_success(), outcome.elapsed, now);

        let raw = match outcome.result {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };

        let accepted = select_entries(raw, &feed, window, &self.classifier);
        let today = now.date_naive();

        let mut dedup = self.dedup.lock().await;
        let mut kept = Vec::new();
        for entry in accepted {
            if max_items.is_some_and(|cap| kept.len() >= cap) {
                break;
            }
            if !dedup.is_duplicate_and_record(&entry, today) {
                kept.push(entry);
            }
        }
        drop(dedup);

        tracing::debug!(
            feed = %feed.name,
            attempts = outcome.attempts,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            entries = kept.len(),
            "Feed crawled"
        );

        kept
    }

    async fn persist(&self, today: NaiveDate) {
        if let Err(e) = self.metrics.lock().await.save() {
            tracing::warn!(error = %e, "Failed to save feed metrics");
        }
        if let Err(e) = self.dedup.lock().await.save(today) {
            tracing::warn!(error = %e, "Failed to save dedup fingerprints");
        }
    }
}

/// Falls back to an empty store when a persisted one cannot be loaded.
///
/// A file that exists but does not decode is renamed aside first, so the
/// end-of-cycle save cannot overwrite the history it held.
fn recover_store<T>(
    store: &'static str,
    path: &Path,
    loaded: Result<T, StorageError>,
    empty: impl FnOnce() -> T,
) -> T {
    let e = match loaded {
        Ok(loaded) => return loaded,
        Err(e) => e,
    };
    tracing::warn!(store, error = %e, "Failed to load store, starting empty");

    if matches!(e, StorageError::Json { .. } | StorageError::TooLarge { .. }) {
        match quarantine_document(path, Utc::now()) {
            Ok(aside) => {
                tracing::warn!(store, moved_to = %aside.display(), "Moved unreadable file aside")
            }
            Err(e) => tracing::error!(store, error = %e, "Failed to move unreadable file aside"),
        }
    }
    empty()
}

/// Flattens per-feed batches and orders them newest first.
///
/// The sort is stable, so entries with equal timestamps keep batch order.
pub fn merge_sorted(batches: Vec<Vec<NewsEntry>>) -> Vec<NewsEntry> {
    let mut merged: Vec<NewsEntry> = batches.into_iter().flatten().collect();
    merged.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    merged
}
