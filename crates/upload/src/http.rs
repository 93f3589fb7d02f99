//! HTTP implementation of [`UploadEndpoint`].
//!
//! Chunks go out as multipart POSTs with a `Content-Range` header; the
//! finalize call is a form-encoded POST. No request timeout is set.

use std::future::Future;
use std::pin::Pin;

use bima_protocol::constants::DEFAULT_FILE_FIELD;
use bima_protocol::{ChunkAck, CompleteRequest, CompleteResponse};
use reqwest::header::CONTENT_RANGE;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::endpoint::{ChunkRequest, UploadEndpoint};
use crate::error::EndpointError;

/// Chunk and complete endpoints of the backend.
pub struct HttpEndpoint {
    http: reqwest::Client,
    chunk_url: String,
    complete_url: String,
    field_name: String,
}

impl HttpEndpoint {
    /// Creates an endpoint posting to the given URLs.
    pub fn new(
        chunk_url: impl Into<String>,
        complete_url: impl Into<String>,
    ) -> Result<Self, EndpointError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            chunk_url: chunk_url.into(),
            complete_url: complete_url.into(),
            field_name: DEFAULT_FILE_FIELD.to_string(),
        })
    }

    /// Sets the multipart field name of the file part.
    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    async fn post_chunk(&self, request: ChunkRequest) -> Result<ChunkAck, EndpointError> {
        let mut form = Form::new();
        for (name, value) in request.fields.pairs() {
            form = form.text(name, value);
        }
        let part = Part::bytes(request.data)
            .file_name(request.file_name.clone())
            .mime_str("application/octet-stream")?;
        form = form.part(self.field_name.clone(), part);

        let mut builder = self.http.post(&self.chunk_url).multipart(form);
        if let Some(range) = request.range.header_value() {
            builder = builder.header(CONTENT_RANGE, range);
        }

        let resp = builder.send().await?;
        let ack: ChunkAck = read_json(resp).await?;
        debug!(
            file = %request.file_name,
            index = request.index,
            offset = ?ack.offset,
            "chunk acknowledged"
        );
        Ok(ack)
    }

    async fn post_complete(
        &self,
        request: CompleteRequest,
    ) -> Result<CompleteResponse, EndpointError> {
        let resp = self
            .http
            .post(&self.complete_url)
            .form(&request)
            .send()
            .await?;
        read_json(resp).await
    }
}

/// Decodes a JSON body, turning non-2xx statuses into [`EndpointError::Status`].
async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, EndpointError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(EndpointError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let body = resp.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

impl UploadEndpoint for HttpEndpoint {
    fn send_chunk(
        &self,
        request: ChunkRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkAck, EndpointError>> + Send + '_>> {
        Box::pin(self.post_chunk(request))
    }

    fn complete(
        &self,
        request: CompleteRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompleteResponse, EndpointError>> + Send + '_>> {
        Box::pin(self.post_complete(request))
    }
}
