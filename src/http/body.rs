//! Response body shared by every handler
//!
//! Small responses are buffered; stored videos are streamed from disk in
//! fixed-size chunks so memory use does not grow with the requested range.

use futures_util::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::ReaderStream;

/// Read size for streamed bodies
pub const CHUNK_SIZE: usize = 64 * 1024;

pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

/// Buffered body with an exact size hint
pub fn full(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn empty() -> ResponseBody {
    full(Bytes::new())
}

/// Stream at most `len` bytes from the reader's current position
pub fn from_reader<R>(reader: R, len: u64) -> ResponseBody
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let frames = ReaderStream::with_capacity(reader.take(len), CHUNK_SIZE).map_ok(Frame::data);
    StreamBody::new(frames).boxed_unsync()
}
