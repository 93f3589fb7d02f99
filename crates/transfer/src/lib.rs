//! Chunk planning, incremental MD5 hashing and admission checks.
//!
//! Everything here is transport-agnostic: the upload crate drives these
//! pieces against an HTTP endpoint.

mod chunked;
mod hasher;
mod progress;
mod types;
mod validation;

pub use chunked::{Chunk, ChunkPlan, ChunkReader};
pub use hasher::{ChunkHasher, Md5Accumulator, md5_hex};
pub use progress::Progress;
pub use types::{UploadFile, UploadSession, UploadState};
pub use validation::{
    AdmissionPolicy, IMAGE_EXTENSIONS, MEDIA_EXTENSIONS, PREVIEW_EXTENSIONS,
    SINGLE_FILE_EXTENSIONS, UploadVariant, ValidationError, extension_of, has_extension,
    is_previewable,
};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short read at byte {offset}: expected {expected} bytes")]
    ShortRead { offset: u64, expected: u64 },

    #[error("window {got} fed out of order, expected {expected}")]
    OutOfOrder { expected: usize, got: usize },

    #[error("acknowledgment {sent} exceeds {total} chunks")]
    TooManyAcks { sent: usize, total: usize },

    #[error("acknowledgment without upload id")]
    MissingUploadId,

    #[error("illegal state transition {from:?} -> {to:?}")]
    IllegalTransition { from: UploadState, to: UploadState },
}
