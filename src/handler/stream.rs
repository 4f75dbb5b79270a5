//! Video streaming handler
//!
//! `GET /stream?file=<name>` serves a stored file inline with byte-range
//! support so browsers can seek. The file is reported as modified "now"
//! on every request.

use chrono::Utc;
use hyper::header::{HeaderValue, CONTENT_DISPOSITION};
use hyper::Response;
use std::io;
use tokio::fs::File;

use crate::config::AppState;
use crate::error::{AppError, AppResult};
use crate::handler::router::RequestContext;
use crate::http::{self, mime, ContentInfo, ResponseBody};

pub async fn stream(state: &AppState, ctx: &RequestContext) -> AppResult<Response<ResponseBody>> {
    let name = ctx
        .query_param("file")
        .filter(|name| !name.is_empty())
        .ok_or(AppError::BadRequest("File parameter missing"))?;
    let path = state
        .store
        .resolve(&name)
        .ok_or(AppError::BadRequest("Invalid file name"))?;

    let file = File::open(&path)
        .await
        .map_err(AppError::storage("Error opening file"))?;
    let metadata = file
        .metadata()
        .await
        .map_err(AppError::storage("Error getting file info"))?;
    if !metadata.is_file() {
        return Err(AppError::Storage {
            context: "Error opening file",
            source: io::Error::other(format!("{} is not a regular file", path.display())),
        });
    }

    let info = ContentInfo {
        content_type: mime::video_content_type(&path),
        size: metadata.len(),
        modified: Utc::now(),
    };
    let mut response = http::serve_content(file, &info, &ctx.conditional)
        .await
        .map_err(AppError::storage("Error reading file"))?;
    response
        .headers_mut()
        .insert(CONTENT_DISPOSITION, HeaderValue::from_static("inline"));
    Ok(response)
}
