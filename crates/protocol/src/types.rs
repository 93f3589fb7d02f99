use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{CSRF_FIELD, UPLOAD_ID_FIELD};

/// Server acknowledgment of one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkAck {
    /// Upload id issued on the first chunk and echoed afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    /// Bytes stored so far on the server side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// When the partial upload expires server-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

/// Body of the finalize request (form-encoded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub csrfmiddlewaretoken: String,
    pub upload_id: String,
    pub md5: String,
}

/// Confirmation returned by the finalize endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub message: String,
    pub upload_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Byte range of a chunk request, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ContentRange {
    /// Value for the `Content-Range` header, or `None` for an empty body.
    ///
    /// The server treats a request without the header as a whole file.
    pub fn header_value(&self) -> Option<String> {
        if self.end <= self.start {
            return None;
        }
        Some(self.to_string())
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bytes {}-{}/{}",
            self.start,
            self.end.saturating_sub(1),
            self.total
        )
    }
}

/// Fixed form fields sent with every chunk request.
///
/// The CSRF token is always present and always first. The upload id is a
/// single-writer register: attached once from the first acknowledgment
/// and cleared when the last chunk is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFields {
    csrf_token: String,
    upload_id: Option<String>,
}

impl FormFields {
    pub fn new(csrf_token: impl Into<String>) -> Self {
        Self {
            csrf_token: csrf_token.into(),
            upload_id: None,
        }
    }

    /// Attaches the upload id unless one is already present.
    ///
    /// Returns `true` if the id was attached by this call.
    pub fn attach_upload_id(&mut self, upload_id: &str) -> bool {
        if self.upload_id.is_some() {
            return false;
        }
        self.upload_id = Some(upload_id.to_string());
        true
    }

    pub fn clear_upload_id(&mut self) {
        self.upload_id = None;
    }

    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    /// Field pairs in wire order.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![(CSRF_FIELD, self.csrf_token.clone())];
        if let Some(id) = &self.upload_id {
            pairs.push((UPLOAD_ID_FIELD, id.clone()));
        }
        pairs
    }
}
