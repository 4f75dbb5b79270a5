//! MIME type detection module
//!
//! Maps file extensions to Content-Type values.

use std::path::Path;

/// Content-Type for files played through `/stream`
///
/// Only `.webm` is recognised; every other file is announced as MP4.
///
/// # Examples
/// ```
/// use vidbox::http::mime::video_content_type;
/// assert_eq!(video_content_type("clip.webm".as_ref()), "video/webm");
/// assert_eq!(video_content_type("clip.mkv".as_ref()), "video/mp4");
/// assert_eq!(video_content_type("README".as_ref()), "video/mp4");
/// ```
pub fn video_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("webm") => "video/webm",
        _ => "video/mp4",
    }
}

/// Get MIME Content-Type for a static asset based on its file extension
pub fn get_content_type(extension: Option<&str>) -> &'static str {
    match extension {
        // Text
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("txt" | "md") => "text/plain; charset=utf-8",

        // JavaScript
        Some("js" | "mjs") => "application/javascript",
        Some("json" | "map") => "application/json",

        // Images
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",

        // Media
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("vtt") => "text/vtt",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",

        _ => "application/octet-stream",
    }
}
