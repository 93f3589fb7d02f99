//! Per-file upload state machine.
//!
//! Drives one [`UploadSession`] through
//! `Idle -> Validating -> Uploading -> (AwaitingHash) -> Finalizing -> Complete`,
//! running the MD5 pass concurrently with the chunk uploads. Finalize is
//! sent exactly once, only after both the last chunk acknowledgment and
//! the digest are available.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bima_protocol::{CompleteRequest, CompleteResponse, FormFields};
use bima_transfer::{ChunkHasher, TransferError, UploadFile, UploadSession, UploadState};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::endpoint::UploadEndpoint;
use crate::error::UploadError;
use crate::types::{UploadEvent, UploadSettings};
use crate::uploader::ChunkUploader;

/// Computes the digest sent with the finalize request.
///
/// The returned future is spawned, so it must own everything it needs.
pub trait ContentHasher: Send + Sync {
    fn hash(
        &self,
        file: UploadFile,
        chunk_size: usize,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'static>>;
}

/// Hex MD5 of the file contents, read in chunk-sized windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5ContentHasher;

impl ContentHasher for Md5ContentHasher {
    fn hash(
        &self,
        file: UploadFile,
        chunk_size: usize,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'static>> {
        Box::pin(async move { ChunkHasher::new(chunk_size).hash_file(&file).await })
    }
}

/// Runs the upload of one file.
pub struct UploadCoordinator<'a> {
    endpoint: &'a dyn UploadEndpoint,
    hasher: Arc<dyn ContentHasher>,
    settings: &'a UploadSettings,
    cancel: CancellationToken,
}

impl<'a> UploadCoordinator<'a> {
    pub fn new(
        endpoint: &'a dyn UploadEndpoint,
        hasher: Arc<dyn ContentHasher>,
        settings: &'a UploadSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            endpoint,
            hasher,
            settings,
            cancel,
        }
    }

    /// Creates a session for `file` sized by the configured chunk size.
    pub fn session(&self, file: UploadFile) -> UploadSession {
        UploadSession::new(file, self.settings.chunk_size)
    }

    /// Drives `session` to `Complete` or `Error`.
    ///
    /// Any failure moves the session to `Error`; nothing is retried.
    pub async fn run(
        &self,
        session: &UploadSession,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<CompleteResponse, UploadError> {
        let result = self.drive(session, events_tx).await;
        if let Err(e) = &result {
            warn!(file = %session.file().name, error = %e, "upload failed");
            if !session.state().is_terminal() {
                session.fail();
                self.emit_state(session, events_tx).await;
            }
        }
        result
    }

    async fn drive(
        &self,
        session: &UploadSession,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<CompleteResponse, UploadError> {
        let file = session.file();

        self.advance(session, UploadState::Validating, events_tx)
            .await?;
        self.settings.policy.admit(&file.name, file.size)?;
        self.check_cancelled()?;

        self.advance(session, UploadState::Uploading, events_tx)
            .await?;
        let mut hash_task = tokio::spawn(self.hasher.hash(file.clone(), self.settings.chunk_size));

        let mut fields = FormFields::new(self.settings.csrf_token.clone());
        let uploader = ChunkUploader::new(self.endpoint, self.cancel.clone());
        let upload = uploader.upload(session, &mut fields, events_tx);
        tokio::pin!(upload);

        // Both pipelines run side by side; a failed digest stops the upload.
        let mut digest = None;
        let upload_id = loop {
            tokio::select! {
                result = &mut upload => match result {
                    Ok(id) => break id,
                    Err(e) => {
                        hash_task.abort();
                        return Err(e);
                    }
                },
                joined = &mut hash_task, if digest.is_none() => {
                    let hex = joined?.map_err(UploadError::Hash)?;
                    debug!(file = %file.name, "digest ready before last ack");
                    digest = Some(hex);
                }
            }
        };

        let digest = match digest {
            Some(hex) => hex,
            None => {
                if !hash_task.is_finished() {
                    self.advance(session, UploadState::AwaitingHash, events_tx)
                        .await?;
                }
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        hash_task.abort();
                        return Err(UploadError::Cancelled);
                    }
                    joined = &mut hash_task => joined?.map_err(UploadError::Hash)?,
                }
            }
        };
        session.set_hash(digest.clone());

        self.advance(session, UploadState::Finalizing, events_tx)
            .await?;
        let request = CompleteRequest {
            csrfmiddlewaretoken: self.settings.csrf_token.clone(),
            upload_id,
            md5: digest,
        };
        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
            result = self.endpoint.complete(request) => {
                result.map_err(UploadError::FinalizeFailed)?
            }
        };

        self.advance(session, UploadState::Complete, events_tx)
            .await?;
        Ok(response)
    }

    async fn advance(
        &self,
        session: &UploadSession,
        next: UploadState,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<(), UploadError> {
        session.transition(next)?;
        debug!(file = %session.file().name, state = ?next, "state changed");
        self.emit_state(session, events_tx).await;
        Ok(())
    }

    async fn emit_state(&self, session: &UploadSession, events_tx: &mpsc::Sender<UploadEvent>) {
        let _ = events_tx
            .send(UploadEvent::StateChanged {
                file_name: session.file().name.clone(),
                state: session.state(),
            })
            .await;
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EndpointError;
    use crate::testing::{MockEndpoint, sample_bytes, write_file};
    use bima_protocol::MessageKey;
    use bima_transfer::{AdmissionPolicy, UploadVariant, md5_hex};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Resolves immediately with a fixed digest.
    struct InstantHasher;

    impl ContentHasher for InstantHasher {
        fn hash(
            &self,
            _file: UploadFile,
            _chunk_size: usize,
        ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'static>>
        {
            Box::pin(async { Ok("instant-digest".to_string()) })
        }
    }

    /// Resolves only after the gate is opened.
    struct GatedHasher {
        gate: Arc<Notify>,
    }

    impl ContentHasher for GatedHasher {
        fn hash(
            &self,
            _file: UploadFile,
            _chunk_size: usize,
        ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'static>>
        {
            let gate = Arc::clone(&self.gate);
            Box::pin(async move {
                gate.notified().await;
                Ok("gated-digest".to_string())
            })
        }
    }

    struct FailingHasher;

    impl ContentHasher for FailingHasher {
        fn hash(
            &self,
            _file: UploadFile,
            _chunk_size: usize,
        ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + 'static>>
        {
            Box::pin(async {
                Err(TransferError::ShortRead {
                    offset: 0,
                    expected: 100,
                })
            })
        }
    }

    fn settings() -> UploadSettings {
        let policy = AdmissionPolicy {
            variant: UploadVariant::Multiple,
            max_file_size: 10_000,
            max_photo_file_size: 5_000,
        };
        UploadSettings::new("csrf-tok", policy).with_chunk_size(100)
    }

    fn states(events: &[UploadEvent]) -> Vec<UploadState> {
        events
            .iter()
            .filter_map(|e| match e {
                UploadEvent::StateChanged { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }

    /// Collects events; runs `on_awaiting` when the session starts waiting
    /// for the digest.
    fn watch(
        mut events_rx: mpsc::Receiver<UploadEvent>,
        on_awaiting: impl FnOnce() + Send + 'static,
    ) -> tokio::task::JoinHandle<Vec<UploadEvent>> {
        tokio::spawn(async move {
            let mut on_awaiting = Some(on_awaiting);
            let mut events = Vec::new();
            while let Some(event) = events_rx.recv().await {
                if let UploadEvent::StateChanged {
                    state: UploadState::AwaitingHash,
                    ..
                } = event
                    && let Some(f) = on_awaiting.take()
                {
                    f();
                }
                events.push(event);
            }
            events
        })
    }

    #[tokio::test]
    async fn hash_ready_before_last_ack_skips_awaiting() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "photo.jpg", &sample_bytes(250));

        let mut mock = MockEndpoint::new("u1");
        mock.chunk_delay = Some(Duration::from_millis(10));
        let settings = settings();
        let coordinator = UploadCoordinator::new(
            &mock,
            Arc::new(InstantHasher),
            &settings,
            CancellationToken::new(),
        );

        let (events_tx, events_rx) = mpsc::channel(64);
        let watcher = watch(events_rx, || {});
        let session = coordinator.session(file);
        let response = coordinator.run(&session, &events_tx).await.unwrap();
        drop(events_tx);
        let events = watcher.await.unwrap();

        assert_eq!(response.upload_id, "u1");
        // An early digest does not cut the upload short.
        assert_eq!(mock.chunk_count(), 3);
        assert_eq!(
            states(&events),
            vec![
                UploadState::Validating,
                UploadState::Uploading,
                UploadState::Finalizing,
                UploadState::Complete,
            ]
        );
        assert_eq!(mock.complete_count(), 1);
        assert_eq!(mock.completes.lock().unwrap()[0].md5, "instant-digest");
        assert_eq!(session.hash().as_deref(), Some("instant-digest"));
        assert_eq!(session.state(), UploadState::Complete);
    }

    #[tokio::test]
    async fn uploads_done_first_waits_for_hash() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "photo.jpg", &sample_bytes(250));

        let mock = MockEndpoint::new("u1");
        let gate = Arc::new(Notify::new());
        let settings = settings();
        let coordinator = UploadCoordinator::new(
            &mock,
            Arc::new(GatedHasher {
                gate: Arc::clone(&gate),
            }),
            &settings,
            CancellationToken::new(),
        );

        let (events_tx, events_rx) = mpsc::channel(64);
        let watcher = watch(events_rx, move || gate.notify_one());
        let session = coordinator.session(file);
        let response = coordinator.run(&session, &events_tx).await.unwrap();
        drop(events_tx);
        let events = watcher.await.unwrap();

        assert_eq!(response.upload_id, "u1");
        assert_eq!(
            states(&events),
            vec![
                UploadState::Validating,
                UploadState::Uploading,
                UploadState::AwaitingHash,
                UploadState::Finalizing,
                UploadState::Complete,
            ]
        );
        // Every chunk was acknowledged before the single finalize.
        assert_eq!(mock.chunk_count(), 3);
        assert_eq!(mock.complete_count(), 1);
        let complete = mock.completes.lock().unwrap()[0].clone();
        assert_eq!(complete.md5, "gated-digest");
        assert_eq!(complete.upload_id, "u1");
        assert_eq!(complete.csrfmiddlewaretoken, "csrf-tok");
    }

    #[tokio::test]
    async fn finalize_carries_file_md5() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample_bytes(1234);
        let file = write_file(dir.path(), "scan.tiff", &data);

        let mock = MockEndpoint::new("u1");
        let settings = settings();
        let coordinator = UploadCoordinator::new(
            &mock,
            Arc::new(Md5ContentHasher),
            &settings,
            CancellationToken::new(),
        );

        let (events_tx, _events_rx) = mpsc::channel(256);
        let session = coordinator.session(file);
        coordinator.run(&session, &events_tx).await.unwrap();

        assert_eq!(mock.chunk_count(), 13);
        assert_eq!(mock.complete_count(), 1);
        assert_eq!(mock.completes.lock().unwrap()[0].md5, md5_hex(&data));
    }

    #[tokio::test]
    async fn empty_file_finalizes_with_empty_digest() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "empty.png", b"");

        let mock = MockEndpoint::new("u1");
        let settings = settings();
        let coordinator = UploadCoordinator::new(
            &mock,
            Arc::new(Md5ContentHasher),
            &settings,
            CancellationToken::new(),
        );

        let (events_tx, _events_rx) = mpsc::channel(64);
        let session = coordinator.session(file);
        coordinator.run(&session, &events_tx).await.unwrap();

        assert_eq!(mock.chunk_count(), 1);
        assert_eq!(
            mock.completes.lock().unwrap()[0].md5,
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[tokio::test]
    async fn rejected_file_makes_no_network_calls() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            ("big.jpg", 6_000, MessageKey::MaxPhotoFileSize),
            ("big.mp4", 20_000, MessageKey::MaxSize),
            ("notes.txt", 10, MessageKey::FileType),
        ];

        for (name, size, key) in cases {
            let file = write_file(dir.path(), name, &sample_bytes(size));
            let mock = MockEndpoint::new("u1");
            let settings = settings();
            let coordinator = UploadCoordinator::new(
                &mock,
                Arc::new(Md5ContentHasher),
                &settings,
                CancellationToken::new(),
            );

            let (events_tx, events_rx) = mpsc::channel(64);
            let watcher = watch(events_rx, || {});
            let session = coordinator.session(file);
            let err = coordinator.run(&session, &events_tx).await.unwrap_err();
            drop(events_tx);
            let events = watcher.await.unwrap();

            assert!(err.is_validation(), "{name}");
            assert_eq!(err.message_key(), key, "{name}");
            assert_eq!(mock.chunk_count(), 0);
            assert_eq!(mock.complete_count(), 0);
            assert_eq!(session.state(), UploadState::Error);
            assert_eq!(
                states(&events),
                vec![UploadState::Validating, UploadState::Error]
            );
        }
    }

    #[tokio::test]
    async fn chunk_failure_skips_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "photo.jpg", &sample_bytes(250));

        let mut mock = MockEndpoint::new("u1");
        mock.fail_chunk = Some(2);
        let settings = settings();
        let coordinator = UploadCoordinator::new(
            &mock,
            Arc::new(Md5ContentHasher),
            &settings,
            CancellationToken::new(),
        );

        let (events_tx, _events_rx) = mpsc::channel(64);
        let session = coordinator.session(file);
        let err = coordinator.run(&session, &events_tx).await.unwrap_err();

        assert!(matches!(err, UploadError::ChunkFailed { index: 2, .. }));
        assert_eq!(err.message_key(), MessageKey::Error);
        assert_eq!(mock.complete_count(), 0);
        assert_eq!(session.state(), UploadState::Error);
    }

    #[tokio::test]
    async fn hash_failure_stops_remaining_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "photo.jpg", &sample_bytes(1000));

        let mut mock = MockEndpoint::new("u1");
        mock.chunk_delay = Some(Duration::from_millis(5));
        let settings = settings();
        let coordinator = UploadCoordinator::new(
            &mock,
            Arc::new(FailingHasher),
            &settings,
            CancellationToken::new(),
        );

        let (events_tx, _events_rx) = mpsc::channel(64);
        let session = coordinator.session(file);
        let err = coordinator.run(&session, &events_tx).await.unwrap_err();

        assert!(matches!(err, UploadError::Hash(TransferError::ShortRead { .. })));
        assert!(mock.chunk_count() < 10, "sent {}", mock.chunk_count());
        assert_eq!(mock.complete_count(), 0);
        assert_eq!(session.state(), UploadState::Error);
        assert!(session.hash().is_none());
    }

    #[tokio::test]
    async fn finalize_failure_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "photo.jpg", &sample_bytes(250));

        let mut mock = MockEndpoint::new("u1");
        mock.fail_complete = true;
        let settings = settings();
        let coordinator = UploadCoordinator::new(
            &mock,
            Arc::new(Md5ContentHasher),
            &settings,
            CancellationToken::new(),
        );

        let (events_tx, _events_rx) = mpsc::channel(64);
        let session = coordinator.session(file);
        let err = coordinator.run(&session, &events_tx).await.unwrap_err();

        match err {
            UploadError::FinalizeFailed(EndpointError::Status { status, .. }) => {
                assert_eq!(status, 400)
            }
            other => panic!("expected FinalizeFailed, got {other:?}"),
        }
        assert_eq!(mock.complete_count(), 1);
        assert_eq!(session.state(), UploadState::Error);
    }

    #[tokio::test]
    async fn cancel_while_awaiting_hash() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_file(dir.path(), "photo.jpg", &sample_bytes(250));

        let mock = MockEndpoint::new("u1");
        let cancel = CancellationToken::new();
        let settings = settings();
        let coordinator = UploadCoordinator::new(
            &mock,
            Arc::new(GatedHasher {
                gate: Arc::new(Notify::new()),
            }),
            &settings,
            cancel.clone(),
        );

        let (events_tx, events_rx) = mpsc::channel(64);
        let watcher = watch(events_rx, move || cancel.cancel());
        let session = coordinator.session(file);
        let err = coordinator.run(&session, &events_tx).await.unwrap_err();
        drop(events_tx);
        let events = watcher.await.unwrap();

        assert!(matches!(err, UploadError::Cancelled));
        assert_eq!(mock.complete_count(), 0);
        assert_eq!(states(&events).last(), Some(&UploadState::Error));
    }
}
