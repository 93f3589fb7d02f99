use serde::{Deserialize, Serialize};

/// Default chunk size in bytes, as configured on the backend.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// Size limits are configured in megabytes of 10^6 bytes.
pub const BYTES_PER_MB: u64 = 1_000_000;

/// Default general file size cap in MB.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 100;

/// Default image-only size cap in MB (0 = no image-specific cap).
pub const DEFAULT_MAX_PHOTO_FILE_SIZE_MB: u64 = 0;

/// Form field carrying the CSRF token. Always sent first.
pub const CSRF_FIELD: &str = "csrfmiddlewaretoken";

/// Form field carrying the server-issued upload id.
pub const UPLOAD_ID_FIELD: &str = "upload_id";

/// Form field carrying the hex MD5 digest on finalize.
pub const MD5_FIELD: &str = "md5";

/// Default multipart field name of the file part.
pub const DEFAULT_FILE_FIELD: &str = "image";

/// Key of a user-facing message supplied by the surrounding page.
///
/// The serialized form matches the page attribute the text is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKey {
    /// File over the general size cap.
    #[serde(rename = "max-size-message")]
    MaxSize,
    /// Image over the image-only size cap.
    #[serde(rename = "max-photo-file-size-message")]
    MaxPhotoFileSize,
    /// Extension not in the allow-list.
    #[serde(rename = "file-type-message")]
    FileType,
    /// Any transport failure.
    #[serde(rename = "error-message")]
    Error,
}

impl MessageKey {
    /// Returns the attribute name this key is looked up by.
    pub fn attr(self) -> &'static str {
        match self {
            Self::MaxSize => "max-size-message",
            Self::MaxPhotoFileSize => "max-photo-file-size-message",
            Self::FileType => "file-type-message",
            Self::Error => "error-message",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_key_serializes_as_attr() {
        for key in [
            MessageKey::MaxSize,
            MessageKey::MaxPhotoFileSize,
            MessageKey::FileType,
            MessageKey::Error,
        ] {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.attr()));
        }
    }
}
