//! `Range` header parsing
//!
//! One `bytes=` range per request (RFC 7233 section 2.1). Multi-range and
//! other units are treated as if no header had been sent.

/// A satisfiable byte range; `end` is inclusive, `None` means end of file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    pub start: u64,
    pub end: Option<u64>,
}

impl RangeRequest {
    /// Last byte position served for a resource of `file_size` bytes
    #[inline]
    pub fn end_position(&self, file_size: u64) -> u64 {
        self.end.unwrap_or_else(|| file_size.saturating_sub(1))
    }

    #[inline]
    pub fn content_length(&self, file_size: u64) -> u64 {
        self.end_position(file_size).saturating_sub(self.start) + 1
    }
}

#[derive(Debug)]
pub enum RangeParseResult {
    Valid(RangeRequest),
    /// Answer with 416 and `Content-Range: bytes */size`
    NotSatisfiable,
    /// Absent or unusable header: serve the whole resource
    None,
}

/// Parse a `Range` header against a resource of `file_size` bytes
///
/// Accepts `bytes=first-last`, `bytes=first-` and `bytes=-suffix`.
///
/// ```
/// use vidbox::http::range::{parse_range_header, RangeParseResult};
///
/// assert!(matches!(
///     parse_range_header(Some("bytes=0-99"), 1000),
///     RangeParseResult::Valid(_)
/// ));
/// assert!(matches!(parse_range_header(None, 1000), RangeParseResult::None));
/// ```
pub fn parse_range_header(range_header: Option<&str>, file_size: u64) -> RangeParseResult {
    let Some(spec) = range_header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeParseResult::None;
    };
    if spec.contains(',') {
        return RangeParseResult::None;
    }
    let Some((first, last)) = spec.split_once('-') else {
        return RangeParseResult::None;
    };

    match (first.trim(), last.trim()) {
        ("", suffix) => suffix_range(suffix, file_size),
        (first, last) => bounded_range(first, last, file_size),
    }
}

/// `-N`: the final N bytes, or the whole file when N exceeds it
fn suffix_range(suffix: &str, file_size: u64) -> RangeParseResult {
    let Ok(suffix) = suffix.parse::<u64>() else {
        return RangeParseResult::None;
    };
    if suffix == 0 || file_size == 0 {
        return RangeParseResult::NotSatisfiable;
    }
    RangeParseResult::Valid(RangeRequest {
        start: file_size.saturating_sub(suffix),
        end: Some(file_size - 1),
    })
}

/// `first-` or `first-last`, with `last` clamped to the final byte
fn bounded_range(first: &str, last: &str, file_size: u64) -> RangeParseResult {
    let Ok(start) = first.parse::<u64>() else {
        return RangeParseResult::None;
    };
    if start >= file_size {
        return RangeParseResult::NotSatisfiable;
    }
    if last.is_empty() {
        return RangeParseResult::Valid(RangeRequest { start, end: None });
    }

    match last.parse::<u64>() {
        Ok(end) if end < start => RangeParseResult::NotSatisfiable,
        Ok(end) => RangeParseResult::Valid(RangeRequest {
            start,
            end: Some(end.min(file_size - 1)),
        }),
        Err(_) => RangeParseResult::None,
    }
}
