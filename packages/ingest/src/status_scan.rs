//! Bucketing a collection by remote processing status.

use std::path::{Path, PathBuf};

use kb_ingest_checkpoint::OutputLayout;
use kb_ingest_models::UploadConfig;
use kb_ingest_models::progress::ProgressCallback;
use kb_ingest_models::report::{ScannedFile, StatusScanReport, StatusSummary};
use kb_ingest_remote::KnowledgeBaseApi;
use kb_ingest_remote_models::{RemoteFile, RemoteStatus};

use crate::listing::{RemoteListing, collect_remote_files};
use crate::{IngestError, report};

fn scanned(file: &RemoteFile) -> ScannedFile {
    ScannedFile {
        id: file.id.clone().unwrap_or_default(),
        filename: file.filename.clone(),
        status: file.status.clone(),
        created_at: file.created_at_display(),
    }
}

/// Buckets an already-fetched listing.
#[must_use]
pub fn build_report(collection_id: &str, listing: &RemoteListing) -> StatusScanReport {
    let mut summary = StatusSummary::default();
    let mut initial_files = Vec::new();
    let mut processing_files = Vec::new();
    let mut failed_files = Vec::new();
    let mut other_files = Vec::new();

    for file in &listing.files {
        match file.status_bucket() {
            RemoteStatus::Initial => {
                summary.initial += 1;
                initial_files.push(scanned(file));
            }
            RemoteStatus::Processing => {
                summary.processing += 1;
                processing_files.push(scanned(file));
            }
            RemoteStatus::Done => summary.done += 1,
            RemoteStatus::Failed => {
                summary.failed += 1;
                failed_files.push(scanned(file));
            }
            RemoteStatus::Other => {
                summary.other += 1;
                other_files.push(scanned(file));
            }
        }
    }

    StatusScanReport {
        scan_time: report::now_rfc3339(),
        collection_id: collection_id.to_string(),
        total_scanned: listing.files.len(),
        pages_scanned: listing.pages_fetched,
        estimated_pages: listing.estimated_pages,
        truncated: listing.error.is_some(),
        summary,
        initial_files,
        processing_files,
        failed_files,
        other_files,
    }
}

/// Scans up to `max_pages` pages of the collection.
///
/// Never fails: a page error ends the scan and the report is marked
/// `truncated`.
pub async fn scan_status(
    api: &dyn KnowledgeBaseApi,
    collection_id: &str,
    page_size: u32,
    max_pages: Option<u32>,
    progress: &dyn ProgressCallback,
) -> StatusScanReport {
    let listing = collect_remote_files(api, collection_id, page_size, max_pages, progress).await;
    progress.finish(format!("Scanned {} file(s)", listing.files.len()));

    let report = build_report(collection_id, &listing);
    if report.truncated {
        log::warn!(
            "Status scan stopped after {} page(s); counts are partial",
            report.pages_scanned
        );
    }
    log::info!("Status of {} file(s): {}", report.total_scanned, report.summary);
    if report.summary.failed > 0 {
        log::warn!(
            "{} file(s) failed remote processing; see failed_files in the report",
            report.summary.failed
        );
    }
    report
}

/// Scans the collection and writes `reports/status_scan_<timestamp>.json`.
///
/// The report goes under the source directory's output layout when
/// `source_dir` is given, otherwise under a collection-only layout.
///
/// # Errors
///
/// Returns [`IngestError`] if the report cannot be written.
pub async fn run(
    api: &dyn KnowledgeBaseApi,
    config: &UploadConfig,
    collection_id: &str,
    source_dir: Option<&Path>,
    max_pages: Option<u32>,
    progress: &dyn ProgressCallback,
) -> Result<(StatusScanReport, PathBuf), IngestError> {
    let layout = source_dir.map_or_else(
        || OutputLayout::for_collection(&config.output_root, collection_id),
        |dir| OutputLayout::for_source(&config.output_root, dir, collection_id),
    );

    let report = scan_status(api, collection_id, config.page_size, max_pages, progress).await;
    let path = layout.report_path(report::STATUS_REPORT, &report::file_timestamp());
    report::write_json(&path, &report).await?;
    Ok((report, path))
}
