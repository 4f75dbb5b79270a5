//! Response builders
//!
//! Builder failures are logged and degrade to an empty 200 rather than panic.

use hyper::body::Bytes;
use hyper::{Response, StatusCode};

use super::body::{self, ResponseBody};

/// Build 304 Not Modified response carrying the matched validator
pub fn build_304_response(validator_header: &str, validator: &str) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header(validator_header, validator)
        .body(body::empty())
        .unwrap_or_else(|e| {
            log_build_error("304", &e);
            Response::new(body::empty())
        })
}

/// Build a short plain-text response, used for every error status
pub fn build_text_response(status: StatusCode, message: &str) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Content-Length", message.len())
        .body(body::full(message.to_owned()))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(body::full(message.to_owned()))
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<ResponseBody> {
    build_text_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response(allow: &str) -> Response<ResponseBody> {
    let mut resp = build_text_response(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed");
    if let Ok(value) = allow.parse() {
        resp.headers_mut().insert("Allow", value);
    }
    resp
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(allow: &str, enable_cors: bool) -> Response<ResponseBody> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", allow);

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", allow)
            .header("Access-Control-Allow-Headers", "Content-Type, Range")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(body::empty()).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(body::empty())
    })
}

/// Build 416 Range Not Satisfiable response
pub fn build_416_response(file_size: u64) -> Response<ResponseBody> {
    let mut resp = build_text_response(StatusCode::RANGE_NOT_SATISFIABLE, "Range Not Satisfiable");
    if let Ok(value) = format!("bytes */{file_size}").parse() {
        resp.headers_mut().insert("Content-Range", value);
    }
    resp
}

/// Build 303 See Other response (post/redirect/get)
pub fn build_see_other_response(target: &str) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::SEE_OTHER)
        .header("Location", target)
        .header("Content-Length", 0)
        .body(body::empty())
        .unwrap_or_else(|e| {
            log_build_error("303", &e);
            Response::new(body::empty())
        })
}

/// Build health check response
pub fn build_health_response(status: &str) -> Response<ResponseBody> {
    build_text_response(StatusCode::OK, status)
}

/// Build generic HTML response
pub fn build_html_response(content: String, is_head: bool) -> Response<ResponseBody> {
    let content_length = content.len();
    let payload = if is_head {
        Bytes::new()
    } else {
        Bytes::from(content)
    };

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .header("Content-Length", content_length)
        .header("Cache-Control", "no-cache")
        .body(body::full(payload))
        .unwrap_or_else(|e| {
            log_build_error("HTML", &e);
            Response::new(body::empty())
        })
}

/// Build success response with cache control
pub fn build_cached_response(
    data: Bytes,
    content_type: &str,
    etag: &str,
    is_head: bool,
) -> Response<ResponseBody> {
    let content_length = data.len();
    let payload = if is_head { Bytes::new() } else { data };

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .header("Accept-Ranges", "bytes")
        .header("ETag", etag)
        .header("Cache-Control", "public, max-age=3600")
        .body(body::full(payload))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(body::empty())
        })
}

/// Build 206 Partial Content response for a cached static asset
pub fn build_partial_response(
    data: Bytes,
    content_type: &str,
    etag: &str,
    start: u64,
    end: u64,
    total_size: u64,
    is_head: bool,
) -> Response<ResponseBody> {
    let content_length = end - start + 1;
    let payload = if is_head { Bytes::new() } else { data };

    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .header("Content-Range", format!("bytes {start}-{end}/{total_size}"))
        .header("Accept-Ranges", "bytes")
        .header("ETag", etag)
        .header("Cache-Control", "public, max-age=3600")
        .body(body::full(payload))
        .unwrap_or_else(|e| {
            log_build_error("206", &e);
            Response::new(body::empty())
        })
}

/// Log response build error
pub(crate) fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
