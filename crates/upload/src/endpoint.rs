//! Upload endpoint trait.
//!
//! `UploadEndpoint` keeps the pipeline decoupled from HTTP so it can be
//! driven by mocks in tests. [`HttpEndpoint`](crate::http::HttpEndpoint)
//! is the production implementation.

use std::future::Future;
use std::pin::Pin;

use bima_protocol::{ChunkAck, CompleteRequest, CompleteResponse, ContentRange, FormFields};

use crate::error::EndpointError;

/// One chunk transmission.
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    /// Original file name, sent with the file part.
    pub file_name: String,
    /// Zero-based chunk index.
    pub index: usize,
    /// Fixed form fields at the time of sending.
    pub fields: FormFields,
    pub range: ContentRange,
    pub data: Vec<u8>,
}

/// Remote side of a chunked upload.
pub trait UploadEndpoint: Send + Sync {
    /// Sends one chunk and waits for its acknowledgment.
    fn send_chunk(
        &self,
        request: ChunkRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkAck, EndpointError>> + Send + '_>>;

    /// Sends the finalize request carrying upload id and digest.
    fn complete(
        &self,
        request: CompleteRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompleteResponse, EndpointError>> + Send + '_>>;
}
