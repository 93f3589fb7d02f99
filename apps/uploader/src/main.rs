//! Bima chunked uploader entry point.

mod app;
mod config;
mod view;

use std::path::PathBuf;

use bima_transfer::UploadVariant;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Uploads photos and media to the Bima archive in chunks.
#[derive(Debug, Parser)]
#[command(name = "bima-upload", version, about)]
struct Cli {
    /// Configuration file (defaults to the platform config path).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upload several new files one after another.
    #[arg(short, long)]
    multiple: bool,

    /// CSRF token, overriding the configured one.
    #[arg(long, env = "BIMA_CSRF_TOKEN")]
    csrf_token: Option<String>,

    /// Upload ids already in the form, comma-separated.
    #[arg(long, value_name = "IDS")]
    upload_ids: Option<String>,

    /// Drop an upload id from the form before uploading.
    #[arg(long = "remove", value_name = "ID")]
    remove: Vec<String>,

    /// Files to upload.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting bima uploader");

    let config = config::Config::load(cli.config.as_deref())?;
    tracing::info!(chunk_url = %config.chunk_url, "configuration loaded");

    let options = app::RunOptions {
        variant: if cli.multiple {
            UploadVariant::Multiple
        } else {
            UploadVariant::Single
        },
        files: cli.files,
        csrf_token: cli.csrf_token,
        upload_ids: cli.upload_ids,
        remove: cli.remove,
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_multiple_files() {
        let cli = Cli::parse_from(["bima-upload", "-m", "a.jpg", "b.png"]);
        assert!(cli.multiple);
        assert_eq!(cli.files.len(), 2);
        assert!(cli.config.is_none());
    }

    #[test]
    fn parses_form_ids_and_removals() {
        let cli = Cli::parse_from([
            "bima-upload",
            "--upload-ids",
            "u1,u2",
            "--remove",
            "u1",
            "--remove",
            "u2",
            "a.jpg",
        ]);
        assert_eq!(cli.upload_ids.as_deref(), Some("u1,u2"));
        assert_eq!(cli.remove, vec!["u1", "u2"]);
        assert!(!cli.multiple);
    }

    #[test]
    fn files_are_required() {
        assert!(Cli::try_parse_from(["bima-upload"]).is_err());
    }
}
