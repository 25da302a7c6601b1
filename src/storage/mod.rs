mod dedup;
mod document;
mod metrics;
mod registry;
mod types;

pub use dedup::{fingerprint, DedupRecord, DedupStore, DEFAULT_RETENTION_DAYS};
pub use document::{load_document, quarantine_document, save_document};
pub use metrics::{FeedMetrics, MetricsStore};
pub use registry::FeedRegistry;
pub use types::{
    Category, FeedDefinition, FeedRecord, FeedUpdate, NewsEntry, StorageError, UnknownCategory,
};
