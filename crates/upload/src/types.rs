//! Data types for the upload flow.

use bima_protocol::{CompleteResponse, MessageKey};
use bima_protocol::constants::DEFAULT_CHUNK_SIZE;
use bima_transfer::{AdmissionPolicy, UploadState};

use crate::error::UploadError;

/// Event emitted while uploading.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// A session moved to a new state.
    StateChanged { file_name: String, state: UploadState },
    /// A chunk was acknowledged.
    Progress {
        file_name: String,
        chunk_index: usize,
        chunks_total: usize,
        bytes_acked: u64,
        total_bytes: u64,
    },
    /// The server confirmed the finalize request.
    Completed {
        file_name: String,
        response: CompleteResponse,
    },
    /// The upload of one file failed.
    Failed {
        file_name: String,
        error: String,
        message_key: MessageKey,
    },
    /// A batch moved on to the file at `uploading_index` (1-based).
    BatchProgress {
        uploading_index: usize,
        total_files: usize,
    },
}

/// Settings shared by every session of a run.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub chunk_size: usize,
    pub csrf_token: String,
    pub policy: AdmissionPolicy,
}

impl UploadSettings {
    pub fn new(csrf_token: impl Into<String>, policy: AdmissionPolicy) -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            csrf_token: csrf_token.into(),
            policy,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

/// Result of uploading one file.
#[derive(Debug)]
pub struct FileOutcome {
    pub file_name: String,
    pub result: Result<CompleteResponse, UploadError>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of a whole batch.
#[derive(Debug, Default)]
pub struct BatchResult {
    /// One entry per input file, in input order.
    pub outcomes: Vec<FileOutcome>,
    /// Upload ids of successfully finalized files.
    pub upload_ids: UploadIdSet,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Ordered set of upload ids, written into a hidden form field as a
/// comma-joined list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadIdSet {
    ids: Vec<String>,
}

impl UploadIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma-joined form value, skipping blanks and duplicates.
    pub fn from_form_value(value: &str) -> Self {
        let mut set = Self::new();
        for id in value.split(',') {
            set.insert(id.trim());
        }
        set
    }

    /// Appends `id` unless it is empty or already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if id.is_empty() || self.contains(id) {
            return false;
        }
        self.ids.push(id.to_string());
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| existing != id);
        self.ids.len() != before
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Comma-joined form value.
    pub fn joined(&self) -> String {
        self.ids.join(",")
    }
}
