//! HTTP plumbing shared by the handlers: ranges, validators, MIME types,
//! response builders and the seekable content server.

pub mod body;
pub mod cache;
pub mod mime;
pub mod range;
pub mod response;
pub mod serve;

// Re-export commonly used types
pub use body::ResponseBody;
pub use range::parse_range_header;
pub use response::{
    build_404_response, build_405_response, build_416_response, build_health_response,
    build_html_response, build_options_response, build_see_other_response, build_text_response,
};
pub use serve::{serve_content, ConditionalHeaders, ContentInfo};
