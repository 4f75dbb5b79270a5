//! Request error taxonomy
//!
//! Every handler failure ends up as one of these variants. The client gets a
//! short plain-text message and the matching status; the full error, source
//! included, goes to the error log.

use hyper::{Response, StatusCode};
use std::io;

use crate::http::{self, ResponseBody};
use crate::logger;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed or incomplete client input
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },

    /// Filesystem failure in the upload store
    #[error("{context}: {source}")]
    Storage {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// Listing page could not be produced
    #[error("{context}: {source}")]
    Render {
        context: &'static str,
        #[source]
        source: io::Error,
    },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Adapter for `map_err` on storage I/O
    pub fn storage(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Storage { context, source }
    }

    /// Adapter for `map_err` on template I/O
    pub fn render(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Render { context, source }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Storage { .. } | Self::Render { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client (no paths, no OS error text)
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::BadRequest(msg) => *msg,
            Self::PayloadTooLarge { .. } => "Upload too large",
            Self::Storage { context, .. } | Self::Render { context, .. } => *context,
        }
    }

    /// Log the error and turn it into a plain-text response
    pub fn into_response(self) -> Response<ResponseBody> {
        let status = self.status();
        if status.is_server_error() {
            logger::log_error(&self.to_string());
        } else {
            logger::log_warning(&self.to_string());
        }
        http::build_text_response(status, self.public_message())
    }
}

impl From<multer::Error> for AppError {
    fn from(err: multer::Error) -> Self {
        match err {
            multer::Error::StreamSizeExceeded { limit }
            | multer::Error::FieldSizeExceeded { limit, .. } => Self::PayloadTooLarge { limit },
            multer::Error::NoBoundary | multer::Error::NoMultipart => {
                Self::BadRequest("Expected a multipart/form-data body")
            }
            _ => Self::BadRequest("Error parsing form"),
        }
    }
}
