use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;

use super::window::parse_date_or;
use crate::util::clean_text;

/// One syndication item before any filtering.
///
/// Title and description are already cleaned of markup; either may be empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

/// Parses RSS/Atom bytes into raw entries.
///
/// feed-rs's own timestamp handling runs first. Only when it leaves an item
/// undated is the document parsed a second time with the crawler's lenient
/// parser, whose dates fill the gaps by position; a date string that matches
/// no known format becomes `now`. Items without any date element keep
/// `published == None`.
pub fn parse_feed(bytes: &[u8], now: DateTime<Utc>) -> Result<Vec<RawEntry>, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;
    let mut entries: Vec<RawEntry> = feed.entries.into_iter().map(raw_entry).collect();

    if entries.iter().any(|e| e.published.is_none()) {
        let lenient = parser::Builder::new()
            .timestamp_parser(move |raw: &str| Some(parse_date_or(raw, now)))
            .build()
            .parse(bytes)?;

        for (entry, reparsed) in entries.iter_mut().zip(lenient.entries) {
            if entry.published.is_none() {
                entry.published = reparsed.published.or(reparsed.updated);
            }
        }
    }

    Ok(entries)
}

fn raw_entry(entry: Entry) -> RawEntry {
    let link = entry
        .links
        .first()
        .map(|l| l.href.trim().to_owned())
        .filter(|href| !href.is_empty());
    let published = entry.published.or(entry.updated);
    let description = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .map(|s| clean_text(&s))
        .unwrap_or_default();
    let title = entry
        .title
        .map(|t| clean_text(&t.content))
        .unwrap_or_default();

    RawEntry {
        title,
        description,
        link,
        published,
    }
}
