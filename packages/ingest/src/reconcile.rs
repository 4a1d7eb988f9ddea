//! Ledger-versus-collection reconciliation.
//!
//! Lists the collection, takes the set of ids the checkpoint believes it
//! uploaded, and reports:
//!
//! * **missing**: ids in the ledger the collection no longer has (deleted
//!   remotely, or a registration that never persisted);
//! * **extra**: ids in the collection the ledger does not explain
//!   (duplicates from overlapping runs, or uploads made by other means).
//!
//! Read-only with respect to both the collection and the checkpoint.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use kb_ingest_checkpoint::{CheckpointStore, OutputLayout};
use kb_ingest_models::progress::ProgressCallback;
use kb_ingest_models::report::{
    ExtraFile, MissingFile, ReconciliationReport, ReconciliationSummary,
};
use kb_ingest_models::{Checkpoint, UploadConfig, file_name_of};
use kb_ingest_remote::KnowledgeBaseApi;
use kb_ingest_remote_models::RemoteFile;

use crate::listing::{RemoteListing, collect_remote_files};
use crate::{IngestError, report};

/// Set difference between ledger ids and remote ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerDiff {
    /// In the ledger, not in the collection.
    pub missing: BTreeSet<String>,
    /// In the collection, not in the ledger.
    pub extra: BTreeSet<String>,
    /// In both.
    pub matched: BTreeSet<String>,
}

#[must_use]
pub fn diff(believed: &BTreeSet<String>, remote: &BTreeSet<String>) -> LedgerDiff {
    LedgerDiff {
        missing: believed.difference(remote).cloned().collect(),
        extra: remote.difference(believed).cloned().collect(),
        matched: believed.intersection(remote).cloned().collect(),
    }
}

/// Builds the report for an already-fetched listing.
#[must_use]
pub fn build_report(
    collection_id: &str,
    checkpoint: &Checkpoint,
    listing: &RemoteListing,
) -> ReconciliationReport {
    let remote: BTreeMap<&str, &RemoteFile> = listing
        .files
        .iter()
        .filter_map(|f| f.id.as_deref().map(|id| (id, f)))
        .collect();
    let remote_ids: BTreeSet<String> = remote.keys().map(|id| (*id).to_string()).collect();
    let believed = checkpoint.believed_uploaded_ids();
    let paths = checkpoint.paths_by_id();

    let LedgerDiff { missing, extra, .. } = diff(&believed, &remote_ids);

    let missing_files: Vec<MissingFile> = missing
        .into_iter()
        .map(|id| {
            let filepath = paths.get(id.as_str()).copied().unwrap_or_default();
            MissingFile {
                filename: file_name_of(Path::new(filepath)),
                filepath: filepath.to_string(),
                knowledge_file_id: id,
            }
        })
        .collect();

    let extra_files: Vec<ExtraFile> = extra
        .into_iter()
        .filter_map(|id| {
            remote.get(id.as_str()).map(|file| ExtraFile {
                filename: file.filename.clone(),
                created_at: file.created_at_display(),
                status: file.status.clone(),
                knowledge_file_id: id,
            })
        })
        .collect();

    ReconciliationReport {
        timestamp: report::now_rfc3339(),
        collection_id: collection_id.to_string(),
        summary: ReconciliationSummary {
            total_remote_files: remote.len(),
            total_ledger_entries: checkpoint.completed_files.len(),
            total_ledger_ids: believed.len(),
            missing: missing_files.len(),
            extra: extra_files.len(),
            remote_listing_complete: listing.is_complete(),
        },
        missing_files,
        extra_files,
    }
}

/// Lists the collection and diffs it against `checkpoint`.
pub async fn reconcile(
    api: &dyn KnowledgeBaseApi,
    collection_id: &str,
    checkpoint: &Checkpoint,
    page_size: u32,
    progress: &dyn ProgressCallback,
) -> ReconciliationReport {
    let listing = collect_remote_files(api, collection_id, page_size, None, progress).await;
    progress.finish(format!("Listed {} remote file(s)", listing.files.len()));

    let report = build_report(collection_id, checkpoint, &listing);
    if !report.summary.remote_listing_complete {
        log::warn!(
            "Remote listing was cut short ({}); extra/missing counts may be inaccurate",
            listing.error.as_deref().unwrap_or("page limit")
        );
    }
    log::info!(
        "Reconciliation: {} remote, {} ledger id(s), {} missing, {} extra",
        report.summary.total_remote_files,
        report.summary.total_ledger_ids,
        report.summary.missing,
        report.summary.extra
    );
    report
}

/// Reconciles the checkpoint of `source_dir` and writes
/// `reports/integrity_check_<timestamp>.json`.
///
/// Returns `None` without contacting the collection when there is no
/// checkpoint to compare against.
///
/// # Errors
///
/// Returns [`IngestError`] if the report cannot be written.
pub async fn run(
    api: &dyn KnowledgeBaseApi,
    config: &UploadConfig,
    collection_id: &str,
    source_dir: &Path,
    progress: &dyn ProgressCallback,
) -> Result<Option<(ReconciliationReport, PathBuf)>, IngestError> {
    let layout = OutputLayout::for_source(&config.output_root, source_dir, collection_id);
    let Some(checkpoint) = CheckpointStore::for_layout(&layout).load().await else {
        log::warn!(
            "No checkpoint at {}; nothing to reconcile",
            layout.checkpoint_path().display()
        );
        return Ok(None);
    };

    let report = reconcile(api, collection_id, &checkpoint, config.page_size, progress).await;
    let path = layout.report_path(report::INTEGRITY_REPORT, &report::file_timestamp());
    report::write_json(&path, &report).await?;
    Ok(Some((report, path)))
}
