//! Sequential chunk transmission for one session.

use bima_protocol::FormFields;
use bima_transfer::{ChunkReader, TransferError, UploadSession};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::endpoint::{ChunkRequest, UploadEndpoint};
use crate::error::{EndpointError, UploadError};
use crate::types::UploadEvent;

/// Sends the windows of one file strictly one at a time.
///
/// Chunk `k + 1` is not read until chunk `k` is acknowledged. A failed
/// chunk is never retried.
pub struct ChunkUploader<'a> {
    endpoint: &'a dyn UploadEndpoint,
    cancel: CancellationToken,
}

impl<'a> ChunkUploader<'a> {
    pub fn new(endpoint: &'a dyn UploadEndpoint, cancel: CancellationToken) -> Self {
        Self { endpoint, cancel }
    }

    /// Uploads every window of the session's file.
    ///
    /// The upload id from the first acknowledgment is attached to `fields`
    /// for the remaining requests and cleared once the last chunk is
    /// acknowledged. Returns the upload id.
    pub async fn upload(
        &self,
        session: &UploadSession,
        fields: &mut FormFields,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<String, UploadError> {
        let file = session.file();
        let windows = session.plan().upload_windows();
        let chunks_total = windows.len();
        let mut reader = ChunkReader::open(&file.path).await?;
        let mut upload_id = String::new();

        for chunk in &windows {
            self.check_cancelled()?;

            let data = reader.read_chunk(chunk).await?;
            let request = ChunkRequest {
                file_name: file.name.clone(),
                index: chunk.index,
                fields: fields.clone(),
                range: chunk.content_range(file.size),
                data,
            };

            let ack = tokio::select! {
                _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                result = self.endpoint.send_chunk(request) => {
                    result.map_err(|source| UploadError::ChunkFailed {
                        index: chunk.index,
                        source,
                    })?
                }
            };

            upload_id = session
                .record_ack(chunk.len(), ack.upload_id.as_deref())
                .map_err(|e| match e {
                    TransferError::MissingUploadId => UploadError::ChunkFailed {
                        index: chunk.index,
                        source: EndpointError::Protocol("acknowledgment without upload id".into()),
                    },
                    other => UploadError::Transfer(other),
                })?;
            fields.attach_upload_id(&upload_id);

            let progress = session.progress();
            debug!(
                file = %file.name,
                chunk = chunk.index,
                chunks_total,
                bytes_acked = progress.bytes_acked,
                "chunk sent"
            );
            let _ = events_tx
                .send(UploadEvent::Progress {
                    file_name: file.name.clone(),
                    chunk_index: chunk.index,
                    chunks_total,
                    bytes_acked: progress.bytes_acked,
                    total_bytes: progress.total_bytes,
                })
                .await;
        }

        fields.clear_upload_id();
        Ok(upload_id)
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }
}
