//! Batch orchestrator for single and multi-file uploads.
//!
//! Files are uploaded strictly one after another; a failed file does not
//! stop the batch. Events from every session are funnelled into a single
//! channel for the view.

use std::sync::Arc;

use bima_transfer::UploadFile;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::coordinator::{ContentHasher, Md5ContentHasher, UploadCoordinator};
use crate::endpoint::UploadEndpoint;
use crate::error::UploadError;
use crate::types::{BatchResult, FileOutcome, UploadEvent, UploadSettings};

const EVENT_CAPACITY: usize = 256;

/// Orchestrates the uploads of a run.
pub struct BatchOrchestrator {
    settings: UploadSettings,
    hasher: Arc<dyn ContentHasher>,
    events_tx: mpsc::Sender<UploadEvent>,
    events_taken: bool,
    cancel: CancellationToken,
}

impl BatchOrchestrator {
    /// Creates a new orchestrator hashing with MD5.
    ///
    /// Events are discarded until [`take_events`](Self::take_events) is
    /// called.
    pub fn new(settings: UploadSettings) -> Self {
        // No receiver yet: sends fail immediately instead of filling up.
        let (events_tx, _) = mpsc::channel(EVENT_CAPACITY);
        Self {
            settings,
            hasher: Arc::new(Md5ContentHasher),
            events_tx,
            events_taken: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the digest implementation.
    pub fn with_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// The receiver must be drained while uploads run.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        if self.events_taken {
            return None;
        }
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        self.events_tx = events_tx;
        self.events_taken = true;
        Some(events_rx)
    }

    /// Returns the cancellation token for this run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Uploads one file.
    pub async fn upload_single(
        &self,
        endpoint: &dyn UploadEndpoint,
        file: UploadFile,
    ) -> FileOutcome {
        self.upload_one(endpoint, file).await
    }

    /// Uploads `files` in order.
    ///
    /// Returns one outcome per file and the upload ids of every file that
    /// finalized successfully.
    pub async fn upload_batch(
        &self,
        endpoint: &dyn UploadEndpoint,
        files: Vec<UploadFile>,
    ) -> BatchResult {
        let total_files = files.len();
        let mut result = BatchResult::default();

        for (i, file) in files.into_iter().enumerate() {
            let _ = self
                .events_tx
                .send(UploadEvent::BatchProgress {
                    uploading_index: i + 1,
                    total_files,
                })
                .await;

            let outcome = self.upload_one(endpoint, file).await;
            if let Ok(response) = &outcome.result {
                result.upload_ids.insert(&response.upload_id);
            }
            result.outcomes.push(outcome);
        }

        info!(
            total = total_files,
            succeeded = result.succeeded(),
            failed = result.failed(),
            "batch finished"
        );
        result
    }

    async fn upload_one(&self, endpoint: &dyn UploadEndpoint, file: UploadFile) -> FileOutcome {
        let file_name = file.name.clone();
        let coordinator = UploadCoordinator::new(
            endpoint,
            Arc::clone(&self.hasher),
            &self.settings,
            self.cancel.child_token(),
        );
        let session = coordinator.session(file);

        let result = coordinator.run(&session, &self.events_tx).await;
        match &result {
            Ok(response) => {
                let _ = self
                    .events_tx
                    .send(UploadEvent::Completed {
                        file_name: file_name.clone(),
                        response: response.clone(),
                    })
                    .await;
                info!(
                    file = %file_name,
                    upload_id = %response.upload_id,
                    elapsed_ms = session.elapsed().as_millis() as u64,
                    "upload completed"
                );
            }
            Err(e) => self.report_failure(&file_name, e).await,
        }

        FileOutcome { file_name, result }
    }

    async fn report_failure(&self, file_name: &str, e: &UploadError) {
        let _ = self
            .events_tx
            .send(UploadEvent::Failed {
                file_name: file_name.to_string(),
                error: e.to_string(),
                message_key: e.message_key(),
            })
            .await;
        error!(file = %file_name, error = %e, "upload failed");
    }
}
