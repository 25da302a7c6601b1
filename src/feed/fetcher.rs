use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

use super::parser::{parse_feed, RawEntry};
use crate::storage::FeedDefinition;

/// Browser User-Agents rotated across requests to avoid trivial blocking.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/122.0.2365.92",
];

/// Errors that can occur while downloading and parsing one feed.
///
/// [`FetchError::is_transient`] splits these into failures worth retrying
/// (network trouble) and structural failures that would fail again.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Feed body could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

impl FetchError {
    /// Network, timeout and HTTP status failures are retried; parse and size
    /// failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_)
            | FetchError::HttpStatus(_)
            | FetchError::Timeout
            | FetchError::IncompleteResponse { .. } => true,
            FetchError::Parse(_) | FetchError::ResponseTooLarge => false,
        }
    }
}

/// Round-robin User-Agent rotation, shared by all concurrent fetches.
///
/// The cursor advances on every request regardless of outcome.
#[derive(Debug)]
pub struct UserAgentPool {
    agents: Vec<String>,
    cursor: AtomicUsize,
}

impl UserAgentPool {
    /// An empty list falls back to [`DEFAULT_USER_AGENTS`].
    pub fn new(agents: Vec<String>) -> Self {
        let agents = if agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|s| (*s).to_owned()).collect()
        } else {
            agents
        };
        Self {
            agents,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn next(&self) -> &str {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.agents.len();
        &self.agents[i]
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Attempt limits for one feed.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least 1.
    pub max_retries: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
    /// Timeout covering request and body download.
    pub request_timeout: Duration,
    /// Body size limit.
    pub max_body_bytes: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl RetryPolicy {
    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Worst-case wall time for one feed: every attempt times out and every
    /// gap sleeps. The retry loop stops scheduling attempts past this point.
    pub fn budget(&self) -> Duration {
        let attempts = self.attempts();
        self.request_timeout * attempts + self.retry_delay * (attempts - 1)
    }
}

/// Result of crawling one feed: raw entries or the error that ended it.
#[derive(Debug)]
pub struct FeedOutcome {
    pub feed_name: String,
    pub result: Result<Vec<RawEntry>, FetchError>,
    /// Attempts actually made (1..=max_retries)
    pub attempts: u32,
    /// Wall time from first request to final outcome, sleeps included
    pub elapsed: Duration,
}

impl FeedOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Downloads and parses one feed with bounded retries.
///
/// State per attempt: fetch → parse. Transient failures sleep
/// `retry_delay` and try again until `max_retries` attempts are spent;
/// structural failures end the loop immediately.
pub async fn crawl_feed(
    client: &reqwest::Client,
    feed: &FeedDefinition,
    policy: &RetryPolicy,
    agents: &UserAgentPool,
    now: DateTime<Utc>,
) -> FeedOutcome {
    let started = Instant::now();
    let budget = policy.budget();
    let max_attempts = policy.attempts();
    let mut attempts = 0u32;

    let result = loop {
        attempts += 1;
        let user_agent = agents.next();

        let outcome = fetch_bytes(client, &feed.url, user_agent, policy).await.and_then(|bytes| {
            parse_feed(&bytes, now).map_err(|e| FetchError::Parse(e.to_string()))
        });

        match outcome {
            Ok(entries) => break Ok(entries),
            Err(e) if !e.is_transient() => {
                tracing::error!(feed = %feed.name, url = %feed.url, error = %e, "Feed failed, not retrying");
                break Err(e);
            }
            Err(e) if attempts >= max_attempts => {
                tracing::warn!(
                    feed = %feed.name,
                    attempts = attempts,
                    error = %e,
                    "Feed failed after all attempts"
                );
                break Err(e);
            }
            Err(e) if started.elapsed() + policy.retry_delay >= budget => {
                tracing::warn!(
                    feed = %feed.name,
                    attempts = attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "Feed retry budget exhausted"
                );
                break Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    feed = %feed.name,
                    attempt = attempts,
                    delay_ms = policy.retry_delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying after delay"
                );
                tokio::time::sleep(policy.retry_delay).await;
            }
        }
    };

    FeedOutcome {
        feed_name: feed.name.clone(),
        result,
        attempts,
        elapsed: started.elapsed(),
    }
}

/// One GET with the given User-Agent, bounded by `policy.request_timeout`
/// across connect, headers and body.
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    user_agent: &str,
    policy: &RetryPolicy,
) -> Result<Vec<u8>, FetchError> {
    let request = async {
        let response = client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, policy.max_body_bytes).await
    };

    tokio::time::timeout(policy.request_timeout, request)
        .await
        .map_err(|_| FetchError::Timeout)?
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(map_reqwest_error)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Category;
    use chrono::TimeZone;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>T</title>
    <item><guid>1</guid><title>Test</title><pubDate>Wed, 03 Jan 2024 10:00:00 GMT</pubDate></item>
</channel></rss>"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 4, 8, 0, 0).unwrap()
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            retry_delay: Duration::from_millis(20),
            request_timeout: Duration::from_millis(500),
            max_body_bytes: 1024 * 1024,
        }
    }

    fn feed_at(url: String) -> FeedDefinition {
        FeedDefinition::new("Test", url, Category::General)
    }

    #[test]
    fn test_user_agents_rotate_round_robin() {
        let pool = UserAgentPool::new(vec!["a".into(), "b".into(), "c".into()]);
        let seen: Vec<_> = (0..5).map(|_| pool.next().to_owned()).collect();
        assert_eq!(seen, vec!["a", "b", "c", "a", "b"]);
    }

    #[test]
    fn test_empty_pool_uses_defaults() {
        let pool = UserAgentPool::new(Vec::new());
        assert_eq!(pool.len(), DEFAULT_USER_AGENTS.len());
        assert_eq!(pool.next(), DEFAULT_USER_AGENTS[0]);
    }

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Timeout.is_transient());
        assert!(FetchError::HttpStatus(503).is_transient());
        assert!(FetchError::IncompleteResponse { expected: 10, received: 5 }.is_transient());
        assert!(!FetchError::Parse("bad".into()).is_transient());
        assert!(!FetchError::ResponseTooLarge.is_transient());
    }

    #[test]
    fn test_budget_covers_all_attempts() {
        let policy = fast_policy();
        assert_eq!(policy.budget(), Duration::from_millis(500 * 3 + 20 * 2));

        let zero = RetryPolicy {
            max_retries: 0,
            ..fast_policy()
        };
        assert_eq!(zero.budget(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_crawl_success_sends_user_agent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(header("user-agent", "agent-one"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let agents = UserAgentPool::new(vec!["agent-one".into()]);
        let outcome = crawl_feed(
            &reqwest::Client::new(),
            &feed_at(format!("{}/feed", mock_server.uri())),
            &fast_policy(),
            &agents,
            now(),
        )
        .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.result.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_retries_then_succeeds() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let outcome = crawl_feed(
            &reqwest::Client::new(),
            &feed_at(format!("{}/feed", mock_server.uri())),
            &fast_policy(),
            &UserAgentPool::default(),
            now(),
        )
        .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_404_exhausts_attempts() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&mock_server)
            .await;

        let outcome = crawl_feed(
            &reqwest::Client::new(),
            &feed_at(format!("{}/feed", mock_server.uri())),
            &fast_policy(),
            &UserAgentPool::default(),
            now(),
        )
        .await;

        assert_eq!(outcome.attempts, 3);
        assert!(matches!(outcome.result, Err(FetchError::HttpStatus(404))));
    }

    #[tokio::test]
    async fn test_malformed_feed_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let outcome = crawl_feed(
            &reqwest::Client::new(),
            &feed_at(format!("{}/feed", mock_server.uri())),
            &fast_policy(),
            &UserAgentPool::default(),
            now(),
        )
        .await;

        assert_eq!(outcome.attempts, 1);
        assert!(matches!(outcome.result, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_oversized_body_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let policy = RetryPolicy {
            max_body_bytes: 1024,
            ..fast_policy()
        };
        let outcome = crawl_feed(
            &reqwest::Client::new(),
            &feed_at(format!("{}/feed", mock_server.uri())),
            &policy,
            &UserAgentPool::default(),
            now(),
        )
        .await;

        assert!(matches!(outcome.result, Err(FetchError::ResponseTooLarge)));
    }

    #[tokio::test]
    async fn test_slow_server_times_out_every_attempt() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_millis(400)),
            )
            .expect(3)
            .mount(&mock_server)
            .await;

        let policy = RetryPolicy {
            request_timeout: Duration::from_millis(100),
            retry_delay: Duration::from_millis(50),
            ..fast_policy()
        };
        let outcome = crawl_feed(
            &reqwest::Client::new(),
            &feed_at(format!("{}/feed", mock_server.uri())),
            &policy,
            &UserAgentPool::default(),
            now(),
        )
        .await;

        assert_eq!(outcome.attempts, 3);
        assert!(matches!(outcome.result, Err(FetchError::Timeout)));
        // Three timeouts plus two gaps
        assert!(outcome.elapsed >= Duration::from_millis(3 * 100 + 2 * 50));
    }

    #[tokio::test]
    async fn test_elapsed_budget_stops_retries_early() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        // Budget is two delays; the second failure lands on it
        let policy = RetryPolicy {
            request_timeout: Duration::ZERO,
            retry_delay: Duration::from_millis(200),
            ..fast_policy()
        };
        assert_eq!(policy.budget(), Duration::from_millis(400));

        let outcome = crawl_feed(
            &reqwest::Client::new(),
            &feed_at(format!("{}/feed", mock_server.uri())),
            &policy,
            &UserAgentPool::default(),
            now(),
        )
        .await;

        assert_eq!(outcome.attempts, 2);
        assert!(outcome.attempts < policy.attempts());
        assert!(matches!(outcome.result, Err(FetchError::Timeout)));
        // One sleep, never a second
        assert!(outcome.elapsed >= Duration::from_millis(200));
        assert!(outcome.elapsed < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Nothing listens on port 1
        let outcome = crawl_feed(
            &reqwest::Client::new(),
            &feed_at("http://127.0.0.1:1/feed".to_string()),
            &fast_policy(),
            &UserAgentPool::default(),
            now(),
        )
        .await;

        assert_eq!(outcome.attempts, 3);
        assert!(matches!(outcome.result, Err(FetchError::Network(_))));
    }
}
