//! Upload error types.

use bima_protocol::MessageKey;
use bima_transfer::{TransferError, ValidationError};

/// Failures talking to the chunk or complete endpoint.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected response: {0}")]
    Protocol(String),
}

/// Errors produced while uploading one file.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("chunk {index} failed: {source}")]
    ChunkFailed {
        index: usize,
        #[source]
        source: EndpointError,
    },

    #[error("finalize failed: {0}")]
    FinalizeFailed(#[source] EndpointError),

    #[error("hashing failed: {0}")]
    Hash(#[source] TransferError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Key of the message shown to the user.
    pub fn message_key(&self) -> MessageKey {
        match self {
            Self::Validation(e) => e.message_key(),
            _ => MessageKey::Error,
        }
    }

    /// Validation errors never reach the network.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
