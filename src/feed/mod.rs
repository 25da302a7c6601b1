//! Feed ingestion: probing, downloading, parsing and filtering syndication feeds.
//!
//! # Architecture
//!
//! - [`validator`] - HEAD probes that find dead feeds and heal redirected URLs
//! - [`fetcher`] - HTTP download with rotating User-Agents and bounded retries
//! - [`parser`] - RSS/Atom bytes to [`RawEntry`] via `feed-rs`
//! - [`window`] - the UTC "yesterday" interval and lenient date parsing
//! - [`keywords`] - include/exclude substring classifier
//! - [`entry`] - the per-entry acceptance pipeline producing `NewsEntry`
//!
//! The scheduler that fans these out across all feeds lives in
//! [`crate::engine`].

pub mod entry;
pub mod fetcher;
pub mod keywords;
pub mod parser;
pub mod validator;
pub mod window;

pub use entry::{select_entries, select_entry, Rejection};
pub use fetcher::{
    crawl_feed, fetch_bytes, FeedOutcome, FetchError, RetryPolicy, UserAgentPool,
    DEFAULT_USER_AGENTS,
};
pub use keywords::{KeywordClassifier, DEFAULT_EXCLUDE_KEYWORDS, DEFAULT_INCLUDE_KEYWORDS};
pub use parser::{parse_feed, RawEntry};
pub use validator::{probe_feed, validate_all, ProbeOutcome, ValidationReport};
pub use window::{parse_date, parse_date_or, DateWindow};
