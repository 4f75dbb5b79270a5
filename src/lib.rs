//! vidbox - upload, list and stream video files over HTTP
//!
//! Three routes share one directory of uploaded files:
//! - `GET /` renders the file listing
//! - `POST /upload` stores a multipart `file` field
//! - `GET /stream?file=<name>` plays a file back with range support

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
pub mod storage;
