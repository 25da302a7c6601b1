//! Concurrent RSS/Atom ingestion: collects yesterday's topical entries from a
//! registry of feeds, suppresses repeats across runs and keeps per-feed health
//! counters.

pub mod config;
pub mod engine;
pub mod feed;
pub mod output;
pub mod storage;
pub mod util;

pub use config::{Config, ConfigError};
pub use engine::{CrawlEngine, EngineError, FeedSelector};
pub use output::{write_output, OutputFormat, SourcePost};
