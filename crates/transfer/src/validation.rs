use bima_protocol::MessageKey;
use bima_protocol::constants::BYTES_PER_MB;

/// Media accepted by the multi-file upload form.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "gif", "jpg", "jpeg", "png", "tif", "tiff", "psd", "eps", "ai", "mov", "mpeg4", "mp4", "avi",
    "wmv", "mpegps", "flv", "3gpp", "webm", "aiff", "wav", "flac", "alac", "ogg", "mp2", "mp3",
    "aac", "amr", "wma", "pdf",
];

/// Media accepted when replacing the file of an existing photo.
pub const SINGLE_FILE_EXTENSIONS: &[&str] = &[
    "gif", "jpg", "jpeg", "png", "tif", "tiff", "psd", "mov", "mpeg4", "mp4", "avi", "wmv",
    "mpegps", "flv", "3gpp", "webm", "aiff", "wav", "flac", "alac", "ogg", "mp2", "mp3", "aac",
    "amr", "wma", "pdf",
];

/// Raster images subject to the image-only size cap.
pub const IMAGE_EXTENSIONS: &[&str] = &["gif", "jpg", "jpeg", "png", "tif", "tiff"];

/// Images that can be previewed after upload.
pub const PREVIEW_EXTENSIONS: &[&str] = &["gif", "jpg", "jpeg", "png"];

/// Which upload form the file is admitted through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadVariant {
    /// One file replacing an existing photo.
    Single,
    /// Several new files uploaded one after another.
    Multiple,
}

/// Reasons a file is refused before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{name} is {size} bytes, over the {max} byte limit")]
    OversizeGeneral { name: String, size: u64, max: u64 },

    #[error("{name} is {size} bytes, over the {max} byte image limit")]
    OversizeImage { name: String, size: u64, max: u64 },

    #[error("unsupported file type: {name}")]
    UnsupportedType { name: String },
}

impl ValidationError {
    /// Key of the message shown to the user.
    pub fn message_key(&self) -> MessageKey {
        match self {
            Self::OversizeGeneral { .. } => MessageKey::MaxSize,
            Self::OversizeImage { .. } => MessageKey::MaxPhotoFileSize,
            Self::UnsupportedType { .. } => MessageKey::FileType,
        }
    }
}

/// Returns the lowercase suffix after the last `.` or `/`.
pub fn extension_of(name: &str) -> Option<String> {
    let idx = name.rfind(['.', '/'])?;
    let ext = &name[idx + 1..];
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Case-insensitive suffix match against `set`.
pub fn has_extension(name: &str, set: &[&str]) -> bool {
    extension_of(name).is_some_and(|ext| set.contains(&ext.as_str()))
}

/// Whether an image preview can be rendered for `name`.
pub fn is_previewable(name: &str) -> bool {
    has_extension(name, PREVIEW_EXTENSIONS)
}

/// Size and type rules a file must pass before upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    pub variant: UploadVariant,
    /// General cap in bytes.
    pub max_file_size: u64,
    /// Image-only cap in bytes; 0 disables it. Ignored by the single-file form.
    pub max_photo_file_size: u64,
}

impl AdmissionPolicy {
    /// Builds a policy from limits in megabytes.
    pub fn from_megabytes(variant: UploadVariant, max_file_mb: u64, max_photo_mb: u64) -> Self {
        Self {
            variant,
            max_file_size: max_file_mb.saturating_mul(BYTES_PER_MB),
            max_photo_file_size: max_photo_mb.saturating_mul(BYTES_PER_MB),
        }
    }

    /// Extensions this policy admits.
    pub fn accepted_extensions(&self) -> &'static [&'static str] {
        match self.variant {
            UploadVariant::Single => SINGLE_FILE_EXTENSIONS,
            UploadVariant::Multiple => MEDIA_EXTENSIONS,
        }
    }

    /// Checks size first, then type.
    pub fn admit(&self, name: &str, size: u64) -> Result<(), ValidationError> {
        if self.variant == UploadVariant::Multiple
            && self.max_photo_file_size > 0
            && has_extension(name, IMAGE_EXTENSIONS)
            && size > self.max_photo_file_size
        {
            return Err(ValidationError::OversizeImage {
                name: name.to_string(),
                size,
                max: self.max_photo_file_size,
            });
        }

        if size > self.max_file_size {
            return Err(ValidationError::OversizeGeneral {
                name: name.to_string(),
                size,
                max: self.max_file_size,
            });
        }

        if !has_extension(name, self.accepted_extensions()) {
            return Err(ValidationError::UnsupportedType {
                name: name.to_string(),
            });
        }

        Ok(())
    }
}
