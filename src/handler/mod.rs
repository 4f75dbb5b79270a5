//! Request handler module
//!
//! Routes requests to the upload, listing, streaming and static asset handlers.

pub mod listing;
pub mod router;
pub mod static_files;
pub mod stream;
pub mod upload;

// Re-export main entry point
pub use router::handle_request;
