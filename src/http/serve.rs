//! Content serving routine
//!
//! Serves a seekable source with range and conditional request handling:
//! `If-Modified-Since`, `If-Range`, single `bytes=` ranges and HEAD.
//! Only the requested span is read, and it is streamed rather than buffered.

use chrono::{DateTime, Utc};
use hyper::{Response, StatusCode};
use std::io::{self, SeekFrom};
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};

use super::body::{self, ResponseBody};
use super::cache;
use super::range::{parse_range_header, RangeParseResult};
use super::response::{self, log_build_error};

/// Request headers relevant to content negotiation
#[derive(Debug, Default, Clone)]
pub struct ConditionalHeaders {
    pub range: Option<String>,
    pub if_range: Option<String>,
    pub if_modified_since: Option<String>,
    pub is_head: bool,
}

/// Metadata about the content being served
#[derive(Debug, Clone)]
pub struct ContentInfo<'a> {
    pub content_type: &'a str,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Serve `source` honouring the conditional headers
///
/// Produces 200, 206, 304 or 416. A seek error is returned to the caller;
/// read errors surface later as a body error on the connection.
pub async fn serve_content<R>(
    mut source: R,
    info: &ContentInfo<'_>,
    cond: &ConditionalHeaders,
) -> io::Result<Response<ResponseBody>>
where
    R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
{
    let last_modified = cache::format_http_date(&info.modified);

    if cond.range.is_none()
        && cache::not_modified_since(cond.if_modified_since.as_deref(), &info.modified)
    {
        return Ok(response::build_304_response("Last-Modified", &last_modified));
    }

    let range_header = if cache::if_range_allows(cond.if_range.as_deref(), &info.modified) {
        cond.range.as_deref()
    } else {
        None
    };

    let (status, start, len) = match parse_range_header(range_header, info.size) {
        RangeParseResult::Valid(range) => (
            StatusCode::PARTIAL_CONTENT,
            range.start,
            range.content_length(info.size),
        ),
        RangeParseResult::NotSatisfiable => return Ok(response::build_416_response(info.size)),
        RangeParseResult::None => (StatusCode::OK, 0, info.size),
    };

    let payload = if cond.is_head || len == 0 {
        body::empty()
    } else {
        source.seek(SeekFrom::Start(start)).await?;
        body::from_reader(source, len)
    };

    let mut builder = Response::builder()
        .status(status)
        .header("Content-Type", info.content_type)
        .header("Content-Length", len)
        .header("Accept-Ranges", "bytes")
        .header("Last-Modified", last_modified);

    if status == StatusCode::PARTIAL_CONTENT {
        builder = builder.header(
            "Content-Range",
            format!("bytes {start}-{}/{}", start + len - 1, info.size),
        );
    }

    Ok(builder.body(payload).unwrap_or_else(|e| {
        log_build_error(status.as_str(), &e);
        Response::new(body::empty())
    }))
}
