use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Instant;

use crate::TransferError;
use crate::chunked::ChunkPlan;
use crate::progress::Progress;

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub path: PathBuf,
    /// Name sent to the server and matched against the allow-lists.
    pub name: String,
    pub size: u64,
}

impl UploadFile {
    /// Reads name and size from disk.
    pub async fn from_path(path: &Path) -> Result<Self, TransferError> {
        let metadata = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            name,
            size: metadata.len(),
        })
    }
}

/// Upload lifecycle of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadState {
    Idle,
    Validating,
    Uploading,
    AwaitingHash,
    Finalizing,
    Complete,
    Error,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: UploadState) -> bool {
        use UploadState::*;
        match (self, next) {
            (from, Error) => !from.is_terminal(),
            (Idle, Validating)
            | (Validating, Uploading)
            | (Uploading, AwaitingHash)
            | (Uploading, Finalizing)
            | (AwaitingHash, Finalizing)
            | (Finalizing, Complete) => true,
            _ => false,
        }
    }
}

/// State of one file's upload (thread-safe).
///
/// Mutated by chunk acknowledgments and by hash completion.
pub struct UploadSession {
    file: UploadFile,
    plan: ChunkPlan,
    inner: RwLock<SessionInner>,
}

struct SessionInner {
    state: UploadState,
    chunks_total: usize,
    chunks_sent: usize,
    bytes_acked: u64,
    upload_id: Option<String>,
    hash: Option<String>,
    started_at: Instant,
}

impl UploadSession {
    /// Creates an idle session for `file`.
    pub fn new(file: UploadFile, chunk_size: usize) -> Self {
        let plan = ChunkPlan::new(file.size, chunk_size);
        Self {
            inner: RwLock::new(SessionInner {
                state: UploadState::Idle,
                chunks_total: plan.upload_windows().len(),
                chunks_sent: 0,
                bytes_acked: 0,
                upload_id: None,
                hash: None,
                started_at: Instant::now(),
            }),
            file,
            plan,
        }
    }

    pub fn file(&self) -> &UploadFile {
        &self.file
    }

    pub fn plan(&self) -> ChunkPlan {
        self.plan
    }

    /// Moves to `next`, rejecting illegal transitions.
    pub fn transition(&self, next: UploadState) -> Result<(), TransferError> {
        let mut s = self.inner.write().unwrap();
        if !s.state.can_transition_to(next) {
            return Err(TransferError::IllegalTransition {
                from: s.state,
                to: next,
            });
        }
        s.state = next;
        Ok(())
    }

    /// Marks the session as failed unless it already ended.
    pub fn fail(&self) {
        let mut s = self.inner.write().unwrap();
        if !s.state.is_terminal() {
            s.state = UploadState::Error;
        }
    }

    /// Records one chunk acknowledgment of `bytes` bytes.
    ///
    /// The first acknowledgment must carry an upload id; it is captured
    /// once and never overwritten. Returns the session's upload id.
    pub fn record_ack(&self, bytes: u64, upload_id: Option<&str>) -> Result<String, TransferError> {
        let mut s = self.inner.write().unwrap();
        if s.chunks_sent >= s.chunks_total {
            return Err(TransferError::TooManyAcks {
                sent: s.chunks_sent + 1,
                total: s.chunks_total,
            });
        }

        let id = match s.upload_id.clone() {
            Some(existing) => existing,
            None => match upload_id {
                Some(new) if !new.is_empty() => {
                    s.upload_id = Some(new.to_string());
                    new.to_string()
                }
                _ => return Err(TransferError::MissingUploadId),
            },
        };

        s.chunks_sent += 1;
        s.bytes_acked += bytes;
        Ok(id)
    }

    pub fn set_hash(&self, hash: String) {
        let mut s = self.inner.write().unwrap();
        s.hash = Some(hash);
    }

    pub fn state(&self) -> UploadState {
        self.inner.read().unwrap().state
    }

    pub fn upload_id(&self) -> Option<String> {
        self.inner.read().unwrap().upload_id.clone()
    }

    pub fn hash(&self) -> Option<String> {
        self.inner.read().unwrap().hash.clone()
    }

    pub fn chunks_sent(&self) -> usize {
        self.inner.read().unwrap().chunks_sent
    }

    pub fn chunks_total(&self) -> usize {
        self.inner.read().unwrap().chunks_total
    }

    pub fn progress(&self) -> Progress {
        let s = self.inner.read().unwrap();
        Progress::new(s.bytes_acked, self.file.size)
    }

    /// Time since the session was created.
    pub fn elapsed(&self) -> std::time::Duration {
        self.inner.read().unwrap().started_at.elapsed()
    }
}
