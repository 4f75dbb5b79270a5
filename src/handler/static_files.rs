//! Static file serving module
//!
//! Serves `/static/*` from the configured asset directory with MIME
//! detection, `ETag` validation and Range support.

use hyper::body::Bytes;
use hyper::Response;
use percent_encoding::percent_decode_str;
use std::path::Path;
use tokio::fs;

use crate::config::AppState;
use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime, range::RangeParseResult, ResponseBody};
use crate::logger;

const ROUTE_PREFIX: &str = "/static/";

/// Serve one asset from the static directory
pub async fn serve_static(state: &AppState, ctx: &RequestContext) -> Response<ResponseBody> {
    let Some(relative) = asset_path(&ctx.path) else {
        return http::build_404_response();
    };
    match load_from_directory(&state.static_dir, &relative).await {
        Some((content, content_type)) => build_static_file_response(
            content,
            content_type,
            ctx.if_none_match.as_deref(),
            ctx.is_head(),
            ctx.conditional.range.as_deref(),
        ),
        None => http::build_404_response(),
    }
}

/// Percent-decoded path below `/static/`
///
/// `+` is kept literally; only query strings use it for spaces.
fn asset_path(request_path: &str) -> Option<String> {
    let raw = request_path.strip_prefix(ROUTE_PREFIX)?;
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    if decoded.contains('\0') {
        return None;
    }
    Some(decoded.into_owned())
}

/// Load an asset, refusing anything that resolves outside `static_dir`
pub async fn load_from_directory(
    static_dir: &Path,
    relative_path: &str,
) -> Option<(Vec<u8>, &'static str)> {
    if relative_path.is_empty() {
        return None;
    }
    let file_path = static_dir.join(relative_path);

    let static_dir_canonical = match fs::canonicalize(static_dir).await {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static directory not found or inaccessible '{}': {e}",
                static_dir.display()
            ));
            return None;
        }
    };

    // File not found is common (404), no need to log at warning level
    let file_path_canonical = fs::canonicalize(&file_path).await.ok()?;
    if !file_path_canonical.starts_with(&static_dir_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {relative_path} -> {}",
            file_path_canonical.display()
        ));
        return None;
    }
    if !fs::metadata(&file_path_canonical).await.ok()?.is_file() {
        return None;
    }

    let content = match fs::read(&file_path_canonical).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {e}",
                file_path.display()
            ));
            return None;
        }
    };

    let content_type = mime::get_content_type(file_path.extension().and_then(|e| e.to_str()));
    Some((content, content_type))
}

/// Build static file response with `ETag` and Range support
fn build_static_file_response(
    data: Vec<u8>,
    content_type: &str,
    if_none_match: Option<&str>,
    is_head: bool,
    range_header: Option<&str>,
) -> Response<ResponseBody> {
    let etag = cache::generate_etag(&data);
    let total_size = data.len() as u64;

    if cache::check_etag_match(if_none_match, &etag) {
        return http::response::build_304_response("ETag", &etag);
    }

    let data = Bytes::from(data);
    match http::parse_range_header(range_header, total_size) {
        RangeParseResult::Valid(range) => {
            let start = range.start;
            let end = range.end_position(total_size);
            // Both bounds are below total_size, which came from a usize
            #[allow(clippy::cast_possible_truncation)]
            let body = data.slice(start as usize..=end as usize);
            http::response::build_partial_response(
                body,
                content_type,
                &etag,
                start,
                end,
                total_size,
                is_head,
            )
        }
        RangeParseResult::NotSatisfiable => http::build_416_response(total_size),
        RangeParseResult::None => {
            http::response::build_cached_response(data, content_type, &etag, is_head)
        }
    }
}
