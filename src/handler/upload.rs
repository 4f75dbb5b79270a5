//! Upload handler
//!
//! `POST /upload` with a `multipart/form-data` body carrying a `file` field.
//! The field is streamed into a part file that replaces the stored file only
//! once the whole body has arrived; the request body is capped at
//! `http.max_upload_size`.

use http_body_util::BodyExt;
use hyper::body::{Body, Bytes};
use hyper::{Request, Response};
use multer::{Constraints, Multipart, SizeLimit};

use crate::config::AppState;
use crate::error::{AppError, AppResult};
use crate::http::{self, ResponseBody};
use crate::logger;
use crate::storage::sanitize_upload_name;

/// Form field holding the uploaded file
pub const FILE_FIELD: &str = "file";

pub async fn upload<B>(req: Request<B>, state: &AppState) -> AppResult<Response<ResponseBody>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let limit = state.config.http.max_upload_size;
    check_content_length(&req, limit)?;

    let content_type = req
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::BadRequest("Expected a multipart/form-data body"))?;
    let boundary = multer::parse_boundary(content_type)?;

    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(limit));
    let mut multipart =
        Multipart::with_constraints(req.into_body().into_data_stream(), boundary, constraints);

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let name = field
            .file_name()
            .and_then(sanitize_upload_name)
            .ok_or(AppError::BadRequest("Missing file name"))?;

        let mut pending = state.store.begin_upload(&name).await?;
        let mut written: u64 = 0;
        let copied: AppResult<()> = async {
            while let Some(chunk) = field.chunk().await? {
                pending.write(&chunk).await?;
                written += chunk.len() as u64;
            }
            Ok(())
        }
        .await;

        if let Err(err) = copied {
            pending.abort().await;
            return Err(err);
        }
        pending.commit().await?;

        logger::log_upload_stored(&name, written);
        return Ok(http::build_see_other_response("/"));
    }

    Err(AppError::BadRequest("Missing file field"))
}

/// Reject early when the declared body size is already over the limit
fn check_content_length<B>(req: &Request<B>, limit: u64) -> AppResult<()> {
    let Some(value) = req.headers().get(hyper::header::CONTENT_LENGTH) else {
        return Ok(());
    };
    match value.to_str().ok().and_then(|s| s.parse::<u64>().ok()) {
        Some(size) if size > limit => Err(AppError::PayloadTooLarge { limit }),
        Some(_) => Ok(()),
        None => {
            logger::log_warning("Invalid Content-Length value, skipping size check");
            Ok(())
        }
    }
}
