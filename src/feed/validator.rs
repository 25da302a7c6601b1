//! Pre-flight existence checks for every registered feed.
//!
//! Each feed URL gets one HEAD request (redirects followed). Feeds that answer
//! 200 at a different final URL are rewritten in the registry, and the registry
//! is saved once at the end when anything moved.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use super::fetcher::UserAgentPool;
use crate::storage::{Category, FeedDefinition, FeedRegistry};
use crate::util::{has_http_scheme, same_location};

/// What one probe concluded about a feed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 200 at the requested URL
    Valid,
    /// 200 after following redirects to this URL
    Moved(String),
    /// Bad scheme, non-200 status, timeout or network error
    Invalid(String),
}

/// Feed names per category, split by probe result.
///
/// Every category present in the registry has a (possibly empty) bucket in
/// all three maps. `updated` names are also listed under `valid`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: BTreeMap<Category, Vec<String>>,
    pub invalid: BTreeMap<Category, Vec<String>>,
    pub updated: BTreeMap<Category, Vec<String>>,
}

impl ValidationReport {
    fn with_categories(categories: impl Iterator<Item = Category>) -> Self {
        let mut report = Self::default();
        for category in categories {
            report.valid.insert(category, Vec::new());
            report.invalid.insert(category, Vec::new());
            report.updated.insert(category, Vec::new());
        }
        report
    }

    pub fn is_valid(&self, category: Category, name: &str) -> bool {
        self.valid
            .get(&category)
            .is_some_and(|names| names.iter().any(|n| n == name))
    }

    pub fn has_updates(&self) -> bool {
        self.updated.values().any(|names| !names.is_empty())
    }

    pub fn valid_count(&self) -> usize {
        self.valid.values().map(Vec::len).sum()
    }

    pub fn invalid_count(&self) -> usize {
        self.invalid.values().map(Vec::len).sum()
    }

    pub fn updated_count(&self) -> usize {
        self.updated.values().map(Vec::len).sum()
    }
}

/// Issues one HEAD request against `url`.
///
/// URLs without an `http://`/`https://` prefix are rejected without any
/// network traffic.
pub async fn probe_feed(
    client: &reqwest::Client,
    url: &str,
    user_agent: &str,
    timeout: Duration,
) -> ProbeOutcome {
    if !has_http_scheme(url) {
        return ProbeOutcome::Invalid("unsupported URL scheme".to_string());
    }

    let request = client
        .head(url)
        .header(reqwest::header::USER_AGENT, user_agent)
        .send();

    let response = match tokio::time::timeout(timeout, request).await {
        Err(_) => return ProbeOutcome::Invalid("probe timed out".to_string()),
        Ok(Err(e)) if e.is_timeout() => {
            return ProbeOutcome::Invalid("probe timed out".to_string())
        }
        Ok(Err(e)) => return ProbeOutcome::Invalid(format!("request failed: {e}")),
        Ok(Ok(response)) => response,
    };

    if response.status() != reqwest::StatusCode::OK {
        return ProbeOutcome::Invalid(format!("status {}", response.status().as_u16()));
    }

    let final_url = response.url().as_str();
    if same_location(url, final_url) {
        ProbeOutcome::Valid
    } else {
        ProbeOutcome::Moved(final_url.to_owned())
    }
}

/// Probes every feed in the registry and heals moved URLs.
///
/// Probes run up to `concurrency` at a time; the report lists names in
/// registry order. When at least one feed moved, the registry is saved once
/// after all probes finish. A failed save is logged and the in-memory
/// registry keeps the new URLs.
pub async fn validate_all(
    registry: &mut FeedRegistry,
    client: &reqwest::Client,
    agents: &UserAgentPool,
    timeout: Duration,
    concurrency: usize,
) -> ValidationReport {
    let feeds: Vec<FeedDefinition> = registry.iter().collect();
    let mut report = ValidationReport::with_categories(registry.categories());

    let outcomes: Vec<(FeedDefinition, ProbeOutcome)> = stream::iter(feeds)
        .map(|feed| async move {
            let outcome = probe_feed(client, &feed.url, agents.next(), timeout).await;
            (feed, outcome)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    for (feed, outcome) in outcomes {
        match outcome {
            ProbeOutcome::Valid => {
                report.valid.entry(feed.category).or_default().push(feed.name);
            }
            ProbeOutcome::Moved(new_url) => {
                tracing::info!(
                    feed = %feed.name,
                    from = %feed.url,
                    to = %new_url,
                    "Feed URL redirected, updating registry"
                );
                registry.set_url(feed.category, &feed.name, &new_url);
                report.valid.entry(feed.category).or_default().push(feed.name.clone());
                report.updated.entry(feed.category).or_default().push(feed.name);
            }
            ProbeOutcome::Invalid(reason) => {
                tracing::warn!(
                    feed = %feed.name,
                    url = %feed.url,
                    reason = %reason,
                    "Feed failed validation"
                );
                report.invalid.entry(feed.category).or_default().push(feed.name);
            }
        }
    }

    if report.has_updates() {
        if let Err(e) = registry.save() {
            tracing::warn!(error = %e, "Failed to persist redirected feed URLs");
        }
    }

    tracing::info!(
        valid = report.valid_count(),
        invalid = report.invalid_count(),
        updated = report.updated_count(),
        "Feed validation complete"
    );

    report
}
