//! Chunked photo upload flow: validate, upload, hash, finalize.
//!
//! This crate implements the client side of a chunked upload backend. It
//! has no UI dependencies; the binary renders the [`UploadEvent`] stream.
//! Transport sits behind [`UploadEndpoint`], with [`HttpEndpoint`] as the
//! production implementation.
//!
//! # Pipeline
//!
//! 1. **Validate**: size and type checks, no network on rejection
//! 2. **Upload**: send chunks one at a time, capture the upload id
//! 3. **Hash**: MD5 of the whole file, concurrent with step 2
//! 4. **Finalize**: one complete request with upload id and digest

pub mod batch;
pub mod coordinator;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod types;
pub mod uploader;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience.
pub use batch::BatchOrchestrator;
pub use coordinator::{ContentHasher, Md5ContentHasher, UploadCoordinator};
pub use endpoint::{ChunkRequest, UploadEndpoint};
pub use error::{EndpointError, UploadError};
pub use http::HttpEndpoint;
pub use types::{BatchResult, FileOutcome, UploadEvent, UploadIdSet, UploadSettings};
pub use uploader::ChunkUploader;
