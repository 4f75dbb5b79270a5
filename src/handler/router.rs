//! Request routing dispatch module
//!
//! Entry point for HTTP request processing, responsible for method validation, route matching, and dispatching.

use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppState;
use crate::handler::{listing, static_files, stream, upload};
use crate::http::{self, ConditionalHeaders, ResponseBody};
use crate::logger::{self, AccessLogEntry};

/// Request context encapsulating information needed for request processing
#[derive(Debug, Default)]
pub struct RequestContext {
    pub path: String,
    pub query: Option<String>,
    pub if_none_match: Option<String>,
    pub conditional: ConditionalHeaders,
}

impl RequestContext {
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };

        Self {
            path: req.uri().path().to_string(),
            query: req.uri().query().map(ToString::to_string),
            if_none_match: header("if-none-match"),
            conditional: ConditionalHeaders {
                range: header("range"),
                if_range: header("if-range"),
                if_modified_since: header("if-modified-since"),
                is_head: req.method() == Method::HEAD,
            },
        }
    }

    /// First value of a query parameter, percent-decoded
    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    pub const fn is_head(&self) -> bool {
        self.conditional.is_head
    }
}

/// Application routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Home,
    Upload,
    Stream,
    Static,
    Health,
}

impl Route {
    fn from_path(path: &str) -> Option<Self> {
        match path {
            "/" => Some(Self::Home),
            "/upload" => Some(Self::Upload),
            "/stream" => Some(Self::Stream),
            "/healthz" => Some(Self::Health),
            p if p.starts_with("/static/") => Some(Self::Static),
            _ => None,
        }
    }

    /// Value of the `Allow` header for this route
    const fn allow(self) -> &'static str {
        match self {
            Self::Upload => "POST, OPTIONS",
            Self::Home | Self::Stream | Self::Static | Self::Health => "GET, HEAD, OPTIONS",
        }
    }

    fn accepts(self, method: &Method) -> bool {
        match self {
            Self::Upload => method == Method::POST,
            _ => method == Method::GET || method == Method::HEAD,
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let started = Instant::now();
    let access_entry = state
        .config
        .logging
        .access_log
        .then(|| new_access_entry(&req, remote_addr));

    let response = dispatch(req, &state).await;

    if let Some(mut entry) = access_entry {
        entry.status = response.status().as_u16();
        entry.body_bytes = response_body_bytes(&response);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Check method and route, then hand off to the matching handler
async fn dispatch<B>(req: Request<B>, state: &AppState) -> Response<ResponseBody>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let Some(route) = Route::from_path(req.uri().path()) else {
        return http::build_404_response();
    };

    if req.method() == Method::OPTIONS {
        return http::build_options_response(route.allow(), state.config.http.enable_cors);
    }
    if !route.accepts(req.method()) {
        logger::log_warning(&format!(
            "Method not allowed: {} {}",
            req.method(),
            req.uri().path()
        ));
        return http::build_405_response(route.allow());
    }

    let ctx = RequestContext::from_request(&req);
    let result = match route {
        Route::Home => listing::home(state, &ctx).await,
        Route::Upload => upload::upload(req, state).await,
        Route::Stream => stream::stream(state, &ctx).await,
        Route::Static => Ok(static_files::serve_static(state, &ctx).await),
        Route::Health => Ok(http::build_health_response("ok")),
    };

    let mut response = result.unwrap_or_else(crate::error::AppError::into_response);
    if state.config.http.enable_cors {
        response
            .headers_mut()
            .insert("Access-Control-Allow-Origin", hyper::header::HeaderValue::from_static("*"));
    }
    if let Ok(server) = state.config.http.server_name.parse() {
        response.headers_mut().insert("Server", server);
    }
    response
}

/// Bytes sent in the body; streamed bodies report their `Content-Length`
fn response_body_bytes(response: &Response<ResponseBody>) -> usize {
    let exact = response.body().size_hint().exact();
    let declared = || {
        response
            .headers()
            .get(hyper::header::CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .parse::<u64>()
            .ok()
    };
    exact
        .or_else(declared)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

fn new_access_entry<B>(req: &Request<B>, remote_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        remote_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = match req.version() {
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        _ => "1.1",
    }
    .to_string();
    entry.referer = header("referer");
    entry.user_agent = header("user-agent");
    entry
}
