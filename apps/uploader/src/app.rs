//! Application orchestrator: wires config, endpoint, uploads and view.

use std::path::PathBuf;

use anyhow::Context;
use bima_transfer::{AdmissionPolicy, UploadFile, UploadVariant};
use bima_upload::{BatchOrchestrator, HttpEndpoint, UploadEvent, UploadIdSet, UploadSettings};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::view::SessionView;

/// What to upload and how.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub variant: UploadVariant,
    pub files: Vec<PathBuf>,
    /// Overrides the configured CSRF token.
    pub csrf_token: Option<String>,
    /// Current comma-joined value of the form's upload id field.
    pub upload_ids: Option<String>,
    /// Upload ids deleted from the form before this run.
    pub remove: Vec<String>,
}

/// Uploads the selected files and prints the upload ids to submit.
pub async fn run(config: Config, options: RunOptions) -> anyhow::Result<()> {
    if options.variant == UploadVariant::Single && options.files.len() != 1 {
        anyhow::bail!("single-file mode takes exactly one file; use --multiple for more");
    }

    let endpoint = HttpEndpoint::new(config.chunk_url.clone(), config.complete_url.clone())?
        .with_field_name(config.field_name.clone());

    let policy = AdmissionPolicy::from_megabytes(
        options.variant,
        config.max_file_size,
        config.max_photo_file_size,
    );
    let csrf_token = options.csrf_token.unwrap_or(config.csrf_token);
    let settings = UploadSettings::new(csrf_token, policy).with_chunk_size(config.chunk_size);

    let mut files = Vec::with_capacity(options.files.len());
    for path in &options.files {
        let file = UploadFile::from_path(path)
            .await
            .with_context(|| format!("cannot read {}", path.display()))?;
        files.push(file);
    }

    let mut previous = options
        .upload_ids
        .as_deref()
        .map(UploadIdSet::from_form_value)
        .unwrap_or_default();
    for id in &options.remove {
        if !previous.remove(id) {
            tracing::warn!(upload_id = %id, "not in the form, nothing to remove");
        }
    }

    let mut orchestrator = BatchOrchestrator::new(settings);
    let events = orchestrator
        .take_events()
        .context("event receiver already taken")?;
    cancel_on_ctrl_c(orchestrator.cancel_token());

    let view = SessionView::new(options.variant, config.messages);
    let view_task = tokio::spawn(render(view, events));

    let (uploaded, failed) = match options.variant {
        UploadVariant::Single => {
            let file = files.remove(0);
            let outcome = orchestrator.upload_single(&endpoint, file).await;
            let mut ids = UploadIdSet::new();
            if let Ok(response) = &outcome.result {
                ids.insert(&response.upload_id);
            }
            (ids, usize::from(!outcome.is_success()))
        }
        UploadVariant::Multiple => {
            let result = orchestrator.upload_batch(&endpoint, files).await;
            let failed = result.failed();
            (result.upload_ids, failed)
        }
    };

    // Closes the event channel so the view drains and returns.
    drop(orchestrator);
    view_task.await?;

    let ids = submitted_ids(options.variant, previous, &uploaded);
    if !ids.is_empty() {
        println!("upload_id={}", ids.joined());
    }
    tracing::info!(uploaded = uploaded.len(), failed, "run finished");

    if uploaded.is_empty() {
        anyhow::bail!("no file was uploaded");
    }
    Ok(())
}

/// Value of the form's upload id field after a run.
///
/// The single-file form holds one id, replaced on success and cleared on
/// error. The multi-file form appends.
fn submitted_ids(
    variant: UploadVariant,
    mut previous: UploadIdSet,
    uploaded: &UploadIdSet,
) -> UploadIdSet {
    match variant {
        UploadVariant::Single => uploaded.clone(),
        UploadVariant::Multiple => {
            for id in uploaded.iter() {
                previous.insert(id);
            }
            previous
        }
    }
}

async fn render(mut view: SessionView, mut events: mpsc::Receiver<UploadEvent>) {
    while let Some(event) = events.recv().await {
        for line in view.handle(&event) {
            println!("{line}");
        }
    }
}

fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling uploads");
            cancel.cancel();
        }
    });
}
