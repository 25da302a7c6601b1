//! Utility functions shared by the fetch pipeline and the registry.
//!
//! - **URL validation**: scheme checks for feed URLs and entry links
//! - **Text cleanup**: HTML/entity/control-character stripping for feed text
//!
//! # Examples
//!
//! ```
//! use feedcrawl::util::{clean_text, has_http_scheme, validate_url};
//!
//! assert!(has_http_scheme("https://example.com/feed.xml"));
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.scheme(), "https");
//!
//! assert_eq!(clean_text("<b>AI</b> news"), "AI news");
//! ```

mod text;
mod url_validator;

pub use text::{clean_text, decode_entities, strip_control_chars, strip_html_tags};
pub use url_validator::{has_http_scheme, same_location, validate_url, UrlValidationError};
