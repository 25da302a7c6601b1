use thiserror::Error;
use url::Url;

/// Errors that can occur during feed/link URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string was empty after trimming.
    #[error("URL is empty")]
    Empty,
    /// The URL does not start with `http://` or `https://`.
    #[error("Unsupported scheme in {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Returns true if the string starts with `http://` or `https://`.
///
/// This is a prefix test on the raw string, so no parsing or network access
/// happens. The validator uses it to reject feeds before probing them.
pub fn has_http_scheme(url_str: &str) -> bool {
    let lower = url_str.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Validates a URL string for use as a feed source or entry link.
///
/// # Errors
///
/// Returns [`UrlValidationError`] if:
/// - The string is blank ([`UrlValidationError::Empty`])
/// - The scheme is not `http` or `https` ([`UrlValidationError::UnsupportedScheme`])
/// - The URL cannot be parsed ([`UrlValidationError::InvalidUrl`])
///
/// # Examples
///
/// ```
/// use feedcrawl::util::validate_url;
///
/// let url = validate_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("ftp://example.com/feed").is_err());
/// assert!(validate_url("   ").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(UrlValidationError::Empty);
    }
    if !has_http_scheme(trimmed) {
        return Err(UrlValidationError::UnsupportedScheme(trimmed.to_owned()));
    }
    Ok(Url::parse(trimmed)?)
}

/// Compares two URL strings after parsing, so `https://a.com` and
/// `https://a.com/` are considered the same location.
///
/// Falls back to a plain string comparison when either side fails to parse.
pub fn same_location(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
