//! Console rendering of upload events.
//!
//! The view only reacts to [`UploadEvent`]s; it never drives the upload.

use bima_transfer::{Progress, UploadState, UploadVariant, is_previewable};
use bima_upload::UploadEvent;

use crate::config::Messages;

/// How an uploaded file is shown in the multi-file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailKind {
    /// Image preview (gif, jpg, jpeg, png).
    Preview,
    /// Generic placeholder.
    Generic,
}

impl ThumbnailKind {
    fn of(file_name: &str) -> Self {
        if is_previewable(file_name) {
            Self::Preview
        } else {
            Self::Generic
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Generic => "file",
        }
    }
}

/// Renders the progress of a single-file or multi-file run.
pub struct SessionView {
    variant: UploadVariant,
    messages: Messages,
    tally: Option<(usize, usize)>,
    last_percent: Option<u8>,
}

impl SessionView {
    pub fn new(variant: UploadVariant, messages: Messages) -> Self {
        Self {
            variant,
            messages,
            tally: None,
            last_percent: None,
        }
    }

    /// Applies `event` and returns the lines to print.
    pub fn handle(&mut self, event: &UploadEvent) -> Vec<String> {
        match event {
            UploadEvent::BatchProgress {
                uploading_index,
                total_files,
            } => {
                self.tally = Some((*uploading_index, *total_files));
                vec![format!("Uploading {uploading_index} of {total_files}")]
            }

            UploadEvent::StateChanged { file_name, state } => match state {
                UploadState::Validating => {
                    self.last_percent = None;
                    Vec::new()
                }
                UploadState::Uploading => vec![format!("{}{file_name}: uploading", self.prefix())],
                UploadState::AwaitingHash => {
                    vec![format!("{}{file_name}: computing checksum", self.prefix())]
                }
                UploadState::Finalizing => {
                    vec![format!("{}{file_name}: finalizing", self.prefix())]
                }
                UploadState::Idle | UploadState::Complete | UploadState::Error => Vec::new(),
            },

            UploadEvent::Progress {
                file_name,
                bytes_acked,
                total_bytes,
                ..
            } => {
                let percent = Progress::new(*bytes_acked, *total_bytes).percent();
                if self.last_percent == Some(percent) {
                    return Vec::new();
                }
                self.last_percent = Some(percent);
                vec![format!("{}{file_name}: {percent}%", self.prefix())]
            }

            UploadEvent::Completed {
                file_name,
                response,
            } => {
                let mut lines = vec![response.message.clone()];
                if self.variant == UploadVariant::Multiple {
                    let kind = ThumbnailKind::of(file_name);
                    lines.push(format!(
                        "[{}] {file_name} ({})",
                        kind.label(),
                        response.upload_id
                    ));
                }
                lines
            }

            UploadEvent::Failed {
                file_name,
                message_key,
                ..
            } => {
                let text = self.messages.get(*message_key);
                vec![format!("{}{file_name}: {text}", self.prefix())]
            }
        }
    }

    fn prefix(&self) -> String {
        match (self.variant, self.tally) {
            (UploadVariant::Multiple, Some((current, total))) => format!("[{current}/{total}] "),
            _ => String::new(),
        }
    }
}
