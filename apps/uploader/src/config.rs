//! Uploader configuration management.
//!
//! Configuration is stored as TOML under the user's config directory
//! (`$XDG_CONFIG_HOME` or `~/.config` on Unix, `%APPDATA%` on Windows).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;

use bima_protocol::MessageKey;
use bima_protocol::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_FILE_FIELD, DEFAULT_MAX_FILE_SIZE_MB,
    DEFAULT_MAX_PHOTO_FILE_SIZE_MB,
};
use bima_transfer::MEDIA_EXTENSIONS;
use serde::{Deserialize, Serialize};

/// Uploader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint receiving the chunks.
    #[serde(default = "default_chunk_url")]
    pub chunk_url: String,

    /// Endpoint receiving the finalize request.
    #[serde(default = "default_complete_url")]
    pub complete_url: String,

    /// CSRF token sent with every request.
    #[serde(default)]
    pub csrf_token: String,

    /// Multipart field name of the file part.
    #[serde(default = "default_field_name")]
    pub field_name: String,

    /// Chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// General size cap in MB.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Image-only size cap in MB (0 = none).
    #[serde(default = "default_max_photo_file_size")]
    pub max_photo_file_size: u64,

    #[serde(default)]
    pub messages: Messages,
}

/// User-facing messages, rendered verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Messages {
    #[serde(rename = "max-size-message", default = "default_max_size_message")]
    pub max_size: String,

    #[serde(
        rename = "max-photo-file-size-message",
        default = "default_max_photo_file_size_message"
    )]
    pub max_photo_file_size: String,

    #[serde(rename = "file-type-message", default = "default_file_type_message")]
    pub file_type: String,

    #[serde(rename = "error-message", default = "default_error_message")]
    pub error: String,
}

impl Messages {
    /// Looks up the text for `key`.
    pub fn get(&self, key: MessageKey) -> &str {
        match key {
            MessageKey::MaxSize => &self.max_size,
            MessageKey::MaxPhotoFileSize => &self.max_photo_file_size,
            MessageKey::FileType => &self.file_type,
            MessageKey::Error => &self.error,
        }
    }
}

fn default_chunk_url() -> String {
    "http://localhost:8000/api/chunked_upload/".into()
}

fn default_complete_url() -> String {
    "http://localhost:8000/api/chunked_upload_complete/".into()
}

fn default_field_name() -> String {
    DEFAULT_FILE_FIELD.into()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE_MB
}

fn default_max_photo_file_size() -> u64 {
    DEFAULT_MAX_PHOTO_FILE_SIZE_MB
}

fn default_max_size_message() -> String {
    format!("Sorry, the maximum file size allowed is {DEFAULT_MAX_FILE_SIZE_MB} MB")
}

fn default_max_photo_file_size_message() -> String {
    format!("Sorry, the maximum image file size allowed is {DEFAULT_MAX_PHOTO_FILE_SIZE_MB} MB")
}

fn default_file_type_message() -> String {
    format!(
        "Sorry, only the following formats are allowed: {}.",
        MEDIA_EXTENSIONS.join(", ")
    )
}

fn default_error_message() -> String {
    "An error has occurred. Please, try again.".into()
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            max_size: default_max_size_message(),
            max_photo_file_size: default_max_photo_file_size_message(),
            file_type: default_file_type_message(),
            error: default_error_message(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_url: default_chunk_url(),
            complete_url: default_complete_url(),
            csrf_token: String::new(),
            field_name: default_field_name(),
            chunk_size: default_chunk_size(),
            max_file_size: default_max_file_size(),
            max_photo_file_size: default_max_photo_file_size(),
            messages: Messages::default(),
        }
    }
}

impl Config {
    /// Reads the TOML file at `path`, or at [`config_path`] when `None`.
    ///
    /// A missing file is written out with the defaults so it can be edited.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => config_path()?,
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("invalid configuration in {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "writing default configuration");
                let config = Self::default();
                config.save(&path)?;
                Ok(config)
            }
            Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
        }
    }

    /// Writes the configuration as pretty TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("cannot write {}", path.display()))?;
        owner_only(path)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Limits the file to its owner.
#[cfg(unix)]
fn owner_only(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn owner_only(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// `<config dir>/bima/uploader.toml`.
fn config_path() -> anyhow::Result<PathBuf> {
    Ok(config_dir()?.join("bima").join("uploader.toml"))
}

#[cfg(windows)]
fn config_dir() -> anyhow::Result<PathBuf> {
    std::env::var_os("APPDATA")
        .map(PathBuf::from)
        .context("APPDATA is not set")
}

#[cfg(not(windows))]
fn config_dir() -> anyhow::Result<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".config"))
        .context("neither XDG_CONFIG_HOME nor HOME is set")
}
