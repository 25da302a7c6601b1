use url::Url;

use super::keywords::KeywordClassifier;
use super::parser::RawEntry;
use super::window::DateWindow;
use crate::storage::{FeedDefinition, NewsEntry};
use crate::util::validate_url;

/// Why a raw entry did not become a [`NewsEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingDate,
    OutsideWindow,
    MissingText,
    OffTopic,
    MissingLink,
}

/// Runs one raw entry through the acceptance pipeline, in order:
/// date present, date inside the window, title and description non-empty,
/// keyword rule, usable link.
///
/// Accepted entries are tagged with the feed's name, language and content type.
pub fn select_entry(
    raw: RawEntry,
    feed: &FeedDefinition,
    window: &DateWindow,
    classifier: &KeywordClassifier,
) -> Result<NewsEntry, Rejection> {
    let published_at = raw.published.ok_or(Rejection::MissingDate)?;
    if !window.contains(published_at) {
        return Err(Rejection::OutsideWindow);
    }

    if raw.title.is_empty() || raw.description.is_empty() {
        return Err(Rejection::MissingText);
    }

    if !classifier.accepts(&raw.title, &raw.description) {
        return Err(Rejection::OffTopic);
    }

    let link: Url = raw
        .link
        .as_deref()
        .and_then(|href| validate_url(href).ok())
        .ok_or(Rejection::MissingLink)?;

    Ok(NewsEntry {
        title: raw.title,
        description: raw.description,
        link,
        published_at,
        source_feed_name: feed.name.clone(),
        feed_language: feed.language.clone(),
        feed_category: feed.content_type.clone(),
    })
}

/// Applies [`select_entry`] to every raw entry, keeping feed order.
pub fn select_entries(
    raw: Vec<RawEntry>,
    feed: &FeedDefinition,
    window: &DateWindow,
    classifier: &KeywordClassifier,
) -> Vec<NewsEntry> {
    let total = raw.len();
    let mut missing = 0usize;

    let accepted: Vec<NewsEntry> = raw
        .into_iter()
        .filter_map(|entry| match select_entry(entry, feed, window, classifier) {
            Ok(accepted) => Some(accepted),
            Err(reason) => {
                if matches!(
                    reason,
                    Rejection::MissingDate | Rejection::MissingText | Rejection::MissingLink
                ) {
                    missing += 1;
                }
                None
            }
        })
        .collect();

    if missing > 0 {
        tracing::debug!(
            feed = %feed.name,
            skipped = missing,
            "Entries skipped for missing date, text or link"
        );
    }
    tracing::debug!(feed = %feed.name, total, accepted = accepted.len(), "Filtered feed entries");

    accepted
}
