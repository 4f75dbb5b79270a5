use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes, Frame};
use hyper::{Method, Request, Response, StatusCode};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use vidbox::config::{AppState, Config};
use vidbox::handler::handle_request;
use vidbox::http::ResponseBody;

const BOUNDARY: &str = "----vidboxTestBoundary7MA4YWxk";
const TEMPLATE: &str = "<!-- row: [$name=$size] -->\n<ul>$file_rows</ul>\n<p>$file_count</p>";

fn test_config(dir: &Path) -> Config {
    let mut cfg = Config::load_from("tests/no-such-config").unwrap();
    cfg.storage.upload_dir = dir.join("uploads").to_string_lossy().into_owned();
    cfg.storage.static_dir = dir.join("static").to_string_lossy().into_owned();
    cfg.storage.template_path = dir.join("index.html").to_string_lossy().into_owned();
    cfg.logging.access_log = false;
    cfg
}

fn test_state(dir: &Path) -> Arc<AppState> {
    std::fs::write(dir.join("index.html"), TEMPLATE).unwrap();
    Arc::new(AppState::new(&test_config(dir)))
}

fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(filename: &str, content: &[u8]) -> Request<Full<Bytes>> {
    let body = multipart_body("file", filename, content);
    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("Content-Length", body.len())
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn get(uri: &str) -> Request<Full<Bytes>> {
    Request::builder()
        .uri(uri)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Request body that hands out one chunk per poll, pending in between,
/// like a slow client
struct TrickleBody {
    chunks: VecDeque<Bytes>,
    ready: bool,
}

impl TrickleBody {
    fn new(data: &[u8], chunk_size: usize) -> Self {
        Self {
            chunks: data.chunks(chunk_size).map(Bytes::copy_from_slice).collect(),
            ready: false,
        }
    }
}

impl Body for TrickleBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        let this = self.get_mut();
        if !this.ready {
            this.ready = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        this.ready = false;
        Poll::Ready(this.chunks.pop_front().map(|chunk| Ok(Frame::data(chunk))))
    }
}

async fn send<B>(state: &Arc<AppState>, req: Request<B>) -> Response<ResponseBody>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    handle_request(req, Arc::clone(state), "127.0.0.1:40000".parse().unwrap())
        .await
        .unwrap()
}

async fn body_bytes(resp: Response<ResponseBody>) -> Bytes {
    resp.into_body().collect().await.unwrap().to_bytes()
}

async fn body_text(resp: Response<ResponseBody>) -> String {
    String::from_utf8(body_bytes(resp).await.to_vec()).unwrap()
}

fn sample_video(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn upload_then_list_shows_name_and_size() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let resp = send(&state, upload_request("a.mp4", &sample_video(3000))).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()["Location"], "/");

    let resp = send(&state, get("/")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["Content-Type"], "text/html; charset=utf-8");
    let html = body_text(resp).await;
    assert!(html.contains("[a.mp4=3000]"), "{html}");
    assert!(html.contains("<p>1</p>"));
}

#[tokio::test]
async fn upload_creates_missing_store_directory() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    assert!(!dir.path().join("uploads").exists());

    let resp = send(&state, upload_request("first.webm", b"webm bytes")).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        std::fs::read(dir.path().join("uploads/first.webm")).unwrap(),
        b"webm bytes"
    );
}

#[tokio::test]
async fn second_upload_overwrites_first() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    send(&state, upload_request("a.mp4", b"the first, longer content")).await;
    let resp = send(&state, upload_request("a.mp4", b"second")).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let resp = send(&state, get("/stream?file=a.mp4")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, Bytes::from_static(b"second"));

    let html = body_text(send(&state, get("/")).await).await;
    assert!(html.contains("[a.mp4=6]"));
}

#[tokio::test]
async fn upload_strips_client_directories() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let resp = send(&state, upload_request("../../escape.mp4", b"data")).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(dir.path().join("uploads/escape.mp4").exists());
    assert!(!dir.path().join("escape.mp4").exists());
}

#[tokio::test]
async fn upload_without_file_field_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let body = multipart_body("attachment", "a.mp4", b"data");
    let req = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Full::new(Bytes::from(body)))
        .unwrap();
    let resp = send(&state, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(resp).await, "Missing file field");
}

#[tokio::test]
async fn upload_that_is_not_multipart_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let req = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from_static(b"{}")))
        .unwrap();
    assert_eq!(send(&state, req).await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    cfg.http.max_upload_size = 1024;
    std::fs::write(dir.path().join("index.html"), TEMPLATE).unwrap();
    let state = Arc::new(AppState::new(&cfg));

    // Declared length over the limit
    let resp = send(&state, upload_request("big.mp4", &sample_video(4096))).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    // No Content-Length: caught while parsing, partial file removed
    let body = multipart_body("file", "big.mp4", &sample_video(4096));
    let req = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Full::new(Bytes::from(body)))
        .unwrap();
    let resp = send(&state, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!dir.path().join("uploads/big.mp4").exists());
}

#[tokio::test]
async fn failed_overwrite_keeps_stored_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    cfg.http.max_upload_size = 1024;
    std::fs::write(dir.path().join("index.html"), TEMPLATE).unwrap();
    let state = Arc::new(AppState::new(&cfg));

    let resp = send(&state, upload_request("a.mp4", b"good content")).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    // Over the limit, no Content-Length, arriving in small pieces so the
    // file field is already being written when the limit trips
    let body = multipart_body("file", "a.mp4", &sample_video(4096));
    let req = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(TrickleBody::new(&body, 256))
        .unwrap();
    let resp = send(&state, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let uploads = dir.path().join("uploads");
    assert_eq!(std::fs::read(uploads.join("a.mp4")).unwrap(), b"good content");
    let names: Vec<_> = std::fs::read_dir(&uploads)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec!["a.mp4"]);
}

#[tokio::test]
async fn trickled_upload_is_stored_whole() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let video = sample_video(5000);

    let body = multipart_body("file", "slow.webm", &video);
    let req = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(TrickleBody::new(&body, 300))
        .unwrap();
    assert_eq!(send(&state, req).await.status(), StatusCode::SEE_OTHER);
    assert_eq!(std::fs::read(dir.path().join("uploads/slow.webm")).unwrap(), video);
}

#[tokio::test]
async fn stream_missing_file_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    std::fs::create_dir(dir.path().join("uploads")).unwrap();

    let resp = send(&state, get("/stream?file=nothing.mp4")).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(resp).await, "Error opening file");
}

#[tokio::test]
async fn stream_without_parameter_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    // The store directory does not even exist: no filesystem access happens
    for uri in ["/stream", "/stream?file=", "/stream?other=a.mp4"] {
        let resp = send(&state, get(uri)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body_text(resp).await, "File parameter missing");
    }
}

#[tokio::test]
async fn stream_rejects_path_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    std::fs::create_dir(dir.path().join("uploads")).unwrap();

    for uri in [
        "/stream?file=../index.html",
        "/stream?file=..%2Findex.html",
        "/stream?file=%2Fetc%2Fpasswd",
    ] {
        let resp = send(&state, get(uri)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn stream_content_type_follows_extension() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let uploads = dir.path().join("uploads");
    std::fs::create_dir(&uploads).unwrap();
    for name in ["clip.webm", "clip.mp4", "clip", "notes.txt"] {
        std::fs::write(uploads.join(name), b"data").unwrap();
    }

    let cases = [
        ("clip.webm", "video/webm"),
        ("clip.mp4", "video/mp4"),
        ("clip", "video/mp4"),
        ("notes.txt", "video/mp4"),
    ];
    for (name, expected) in cases {
        let resp = send(&state, get(&format!("/stream?file={name}"))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["Content-Type"], expected, "{name}");
        assert_eq!(resp.headers()["Content-Disposition"], "inline");
        assert_eq!(resp.headers()["Accept-Ranges"], "bytes");
        assert_eq!(resp.headers()["Content-Length"], "4");
    }
}

#[tokio::test]
async fn stream_range_request_returns_partial_content() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    let video = sample_video(1000);
    send(&state, upload_request("movie.mp4", &video)).await;

    let req = Request::builder()
        .uri("/stream?file=movie.mp4")
        .header("Range", "bytes=100-199")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let resp = send(&state, req).await;

    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(resp.headers()["Content-Range"], "bytes 100-199/1000");
    assert_eq!(resp.headers()["Content-Length"], "100");
    assert_eq!(resp.headers()["Content-Disposition"], "inline");
    assert!(resp.headers().contains_key("Last-Modified"));
    let body = body_bytes(resp).await;
    assert_eq!(body.len(), 100);
    assert_eq!(&body[..], &video[100..200]);
}

#[tokio::test]
async fn stream_range_past_end_is_not_satisfiable() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    send(&state, upload_request("short.mp4", b"0123456789")).await;

    let req = Request::builder()
        .uri("/stream?file=short.mp4")
        .header("Range", "bytes=50-60")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let resp = send(&state, req).await;
    assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(resp.headers()["Content-Range"], "bytes */10");
}

#[tokio::test]
async fn listing_fails_when_store_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let resp = send(&state, get("/")).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(resp).await, "Error listing files");
}

#[tokio::test]
async fn listing_fails_when_template_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    std::fs::create_dir(dir.path().join("uploads")).unwrap();
    std::fs::remove_file(dir.path().join("index.html")).unwrap();

    let resp = send(&state, get("/")).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(resp).await, "Error loading template");
}

#[tokio::test]
async fn listing_picks_up_template_edits() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    std::fs::create_dir(dir.path().join("uploads")).unwrap();

    let before = body_text(send(&state, get("/")).await).await;
    assert!(before.contains("<p>0</p>"));

    std::fs::write(dir.path().join("index.html"), "count=$file_count").unwrap();
    let after = body_text(send(&state, get("/")).await).await;
    assert_eq!(after, "count=0");
}

#[tokio::test]
async fn head_listing_has_headers_only() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    std::fs::create_dir(dir.path().join("uploads")).unwrap();

    let req = Request::builder()
        .method(Method::HEAD)
        .uri("/")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let resp = send(&state, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_ne!(resp.headers()["Content-Length"], "0");
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn routing_rejects_wrong_methods_and_unknown_paths() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let resp = send(&state, get("/upload")).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(resp.headers()["Allow"], "POST, OPTIONS");

    let req = Request::builder()
        .method(Method::DELETE)
        .uri("/stream?file=a.mp4")
        .body(Full::new(Bytes::new()))
        .unwrap();
    assert_eq!(
        send(&state, req).await.status(),
        StatusCode::METHOD_NOT_ALLOWED
    );

    let resp = send(&state, get("/uploads/a.mp4")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/upload")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let resp = send(&state, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(resp.headers()["Allow"], "POST, OPTIONS");
}

#[tokio::test]
async fn static_assets_and_health() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    std::fs::create_dir(dir.path().join("static")).unwrap();
    std::fs::write(dir.path().join("static/style.css"), "main { margin: 0 }").unwrap();

    let resp = send(&state, get("/static/style.css")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["Content-Type"], "text/css");
    assert_eq!(body_text(resp).await, "main { margin: 0 }");

    std::fs::write(dir.path().join("static/my font.css"), "p {}").unwrap();
    let resp = send(&state, get("/static/my%20font.css")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "p {}");

    let resp = send(&state, get("/static/missing.js")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&state, get("/healthz")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "ok");
}
