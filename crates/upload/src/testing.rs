//! Mock endpoint shared by the pipeline tests.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bima_protocol::{ChunkAck, CompleteRequest, CompleteResponse};
use bima_transfer::UploadFile;

use crate::endpoint::{ChunkRequest, UploadEndpoint};
use crate::error::EndpointError;

/// Records every request and answers like the chunked upload backend.
pub(crate) struct MockEndpoint {
    pub upload_id: String,
    pub chunk_delay: Option<Duration>,
    /// Chunk index (counted across all files) answered with HTTP 500.
    pub fail_chunk: Option<usize>,
    /// Answer the first chunk without an upload id.
    pub omit_upload_id: bool,
    pub fail_complete: bool,
    /// File names whose finalize request is rejected.
    pub reject_files: Vec<String>,
    pub chunks: Mutex<Vec<ChunkRequest>>,
    pub completes: Mutex<Vec<CompleteRequest>>,
    issued: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    uploads: AtomicUsize,
}

impl MockEndpoint {
    pub fn new(upload_id: &str) -> Self {
        Self {
            upload_id: upload_id.to_string(),
            chunk_delay: None,
            fail_chunk: None,
            omit_upload_id: false,
            fail_complete: false,
            reject_files: Vec::new(),
            chunks: Mutex::new(Vec::new()),
            completes: Mutex::new(Vec::new()),
            issued: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }

    pub fn complete_count(&self) -> usize {
        self.completes.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Upload id issued for a new upload; each file gets its own.
    fn issue_id(&self, file_name: &str) -> String {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        let id = if n == 0 {
            self.upload_id.clone()
        } else {
            format!("{}-{n}", self.upload_id)
        };
        self.issued
            .lock()
            .unwrap()
            .push((id.clone(), file_name.to_string()));
        id
    }
}

impl UploadEndpoint for MockEndpoint {
    fn send_chunk(
        &self,
        request: ChunkRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkAck, EndpointError>> + Send + '_>> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.chunk_delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let seq = {
                let mut chunks = self.chunks.lock().unwrap();
                chunks.push(request.clone());
                chunks.len() - 1
            };
            if self.fail_chunk == Some(seq) {
                return Err(EndpointError::Status {
                    status: 500,
                    body: "Internal Server Error".into(),
                });
            }

            let upload_id = match request.fields.upload_id() {
                Some(id) => Some(id.to_string()),
                None if self.omit_upload_id => None,
                None => Some(self.issue_id(&request.file_name)),
            };
            Ok(ChunkAck {
                upload_id,
                offset: Some(request.range.end),
                expires: None,
            })
        })
    }

    fn complete(
        &self,
        request: CompleteRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompleteResponse, EndpointError>> + Send + '_>> {
        Box::pin(async move {
            self.completes.lock().unwrap().push(request.clone());
            let file_name = self
                .issued
                .lock()
                .unwrap()
                .iter()
                .find(|(id, _)| *id == request.upload_id)
                .map(|(_, name)| name.clone())
                .unwrap_or_default();

            if self.fail_complete || self.reject_files.contains(&file_name) {
                return Err(EndpointError::Status {
                    status: 400,
                    body: "md5 checksum does not match".into(),
                });
            }
            Ok(CompleteResponse {
                message: format!("You successfully uploaded {file_name}"),
                upload_id: request.upload_id,
                filename: Some(file_name),
            })
        })
    }
}

/// Writes `data` to `dir/name` and describes it.
pub(crate) fn write_file(dir: &Path, name: &str, data: &[u8]) -> UploadFile {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    UploadFile {
        path,
        name: name.to_string(),
        size: data.len() as u64,
    }
}

pub(crate) fn sample_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}
