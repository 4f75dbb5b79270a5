//! HTTP cache validation module
//!
//! `ETag` generation, `If-None-Match` matching and HTTP-date handling for
//! `Last-Modified` / `If-Modified-Since` / `If-Range`.

use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Generate `ETag` using fast hashing
///
/// Returns a quoted `ETag` string, e.g. `"abc123def"`.
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    let v = hasher.finish();
    format!("\"{v:x}\"")
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports a single tag, a comma separated list, and the `*` wildcard.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|client_etag| {
        client_etag
            .split(',')
            .any(|e| e.trim() == etag || e.trim() == "*")
    })
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn format_http_date(time: &DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP date header value
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// `If-Modified-Since` check at one-second resolution
///
/// Returns true when the resource has not changed since the client's copy
/// (the response should be 304).
pub fn not_modified_since(if_modified_since: Option<&str>, modified: &DateTime<Utc>) -> bool {
    if_modified_since
        .and_then(parse_http_date)
        .is_some_and(|since| modified.timestamp() <= since.timestamp())
}

/// `If-Range` evaluation: should a `Range` header still be honoured?
///
/// Only date validators can match since no entity tags are produced for
/// streamed content; a tag or an unparseable value disables the range.
pub fn if_range_allows(if_range: Option<&str>, modified: &DateTime<Utc>) -> bool {
    match if_range {
        None => true,
        Some(value) if value.trim_start().starts_with('"') || value.trim_start().starts_with("W/") => {
            false
        }
        Some(value) => parse_http_date(value)
            .is_some_and(|date| modified.timestamp() <= date.timestamp()),
    }
}
