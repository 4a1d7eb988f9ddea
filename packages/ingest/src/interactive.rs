#![allow(clippy::module_name_repetitions)]

//! Interactive menu for the `kb_ingest` binary.
//!
//! Runs when no subcommand is given. Every prompt that has an environment
//! variable counterpart offers its value as the default.

use std::path::PathBuf;

use dialoguer::{Input, Select};
use kb_ingest_cli_utils::{DialoguerConfirm, MultiProgress};
use kb_ingest_models::UploadConfig;

use crate::commands::{Session, cancel_on_ctrl_c};

/// Top-level actions available in the interactive menu.
enum IngestAction {
    Upload,
    Reconcile,
    ScanStatus,
    DeleteExtras,
    UploadMissing,
    FixFailed,
}

impl IngestAction {
    const ALL: &[Self] = &[
        Self::Upload,
        Self::Reconcile,
        Self::ScanStatus,
        Self::DeleteExtras,
        Self::UploadMissing,
        Self::FixFailed,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Upload => "Upload a directory",
            Self::Reconcile => "Check integrity against the checkpoint",
            Self::ScanStatus => "Scan processing status",
            Self::DeleteExtras => "Delete extra files (from an integrity report)",
            Self::UploadMissing => "Upload missing files (from an integrity report)",
            Self::FixFailed => "Fix failed files (from a status report)",
        }
    }
}

/// Prompts for an action and its inputs, then runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails, the environment is missing the API
/// key, or the selected command fails.
pub async fn run(
    config: UploadConfig,
    collection: Option<String>,
    multi: MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<&str> = IngestAction::ALL.iter().map(IngestAction::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    let collection_id = prompt_text("Knowledge base id", collection)?;
    let session = Session::connect(config, collection_id, multi)?;

    match IngestAction::ALL[idx] {
        IngestAction::Upload => {
            let source = prompt_path("Directory to upload", std::env::var("KB_SOURCE_DIR").ok())?;
            let cancel = cancel_on_ctrl_c();
            session.upload(&source, &cancel).await?;
        }
        IngestAction::Reconcile => {
            let source = prompt_path(
                "Directory whose checkpoint to compare",
                std::env::var("KB_SOURCE_DIR").ok(),
            )?;
            session.reconcile(&source).await?;
        }
        IngestAction::ScanStatus => {
            let max_pages = prompt_optional_u32("Page limit (empty for all pages)")?;
            session.scan_status(None, max_pages).await?;
        }
        IngestAction::DeleteExtras => {
            let report = prompt_path("Integrity report", None)?;
            let confirm = DialoguerConfirm::new(session.multi().clone());
            session.delete_extras(&report, &confirm).await?;
        }
        IngestAction::UploadMissing => {
            let report = prompt_path("Integrity report", None)?;
            let files_dir =
                prompt_optional_path("Fallback directory for moved files (empty for none)")?;
            let source = prompt_optional_path(
                "Source directory whose checkpoint to update (empty to skip)",
            )?;
            let confirm = DialoguerConfirm::new(session.multi().clone());
            session
                .upload_missing(&report, files_dir.as_deref(), source.as_deref(), &confirm)
                .await?;
        }
        IngestAction::FixFailed => {
            let report = prompt_path("Status report", None)?;
            let files_dir = prompt_path(
                "Directory holding the original files",
                std::env::var("KB_SOURCE_DIR").ok(),
            )?;
            let confirm = DialoguerConfirm::new(session.multi().clone());
            session.fix_failed(&report, &files_dir, &confirm).await?;
        }
    }

    Ok(())
}

fn prompt_text(prompt: &str, default: Option<String>) -> Result<String, dialoguer::Error> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(default) = default.filter(|d| !d.is_empty()) {
        input = input.default(default);
    }
    input.interact_text()
}

fn prompt_path(prompt: &str, default: Option<String>) -> Result<PathBuf, dialoguer::Error> {
    prompt_text(prompt, default).map(PathBuf::from)
}

fn prompt_optional_path(prompt: &str) -> Result<Option<PathBuf>, dialoguer::Error> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    let trimmed = input.trim();
    Ok((!trimmed.is_empty()).then(|| PathBuf::from(trimmed)))
}

/// Prompts for an optional number. Returns `None` on empty or unparsable
/// input.
fn prompt_optional_u32(prompt: &str) -> Result<Option<u32>, dialoguer::Error> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    Ok(input.trim().parse().ok())
}
