//! Wire types for the bima_back chunked upload endpoints.
//!
//! Two endpoints take part in an upload: a chunk endpoint receiving
//! multipart POSTs with a `Content-Range` header, and a complete endpoint
//! receiving `{csrfmiddlewaretoken, upload_id, md5}` once every chunk has
//! been acknowledged.

pub mod constants;
pub mod types;

// Re-export primary types for convenience.
pub use constants::MessageKey;
pub use types::{ChunkAck, CompleteRequest, CompleteResponse, ContentRange, FormFields};
