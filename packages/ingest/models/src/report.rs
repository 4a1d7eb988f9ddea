//! Report and log records written under `reports/`.
//!
//! All of these are plain serde structs. Field names are part of the on-disk
//! format: repair actions read reconciliation and status scan reports back
//! in, possibly from a different run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{UploadStatus, UploadTask};

/// A file the ledger says was uploaded but the collection does not have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingFile {
    pub filename: String,
    /// Local path recorded in the ledger.
    pub filepath: String,
    pub knowledge_file_id: String,
}

/// A file in the collection the ledger does not account for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraFile {
    pub filename: String,
    pub knowledge_file_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Counts for a [`ReconciliationReport`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub total_remote_files: usize,
    pub total_ledger_entries: usize,
    pub total_ledger_ids: usize,
    pub missing: usize,
    pub extra: usize,
    /// `false` when a page error cut the listing short; `extra` may then be
    /// too small and `missing` too large.
    pub remote_listing_complete: bool,
}

/// Diff between the ledger and the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub timestamp: String,
    pub collection_id: String,
    pub summary: ReconciliationSummary,
    pub missing_files: Vec<MissingFile>,
    pub extra_files: Vec<ExtraFile>,
}

/// One remote entry as captured by a status scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedFile {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

/// Per-bucket counts of a status scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub initial: usize,
    pub processing: usize,
    pub done: usize,
    pub failed: usize,
    pub other: usize,
}

impl StatusSummary {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.initial + self.processing + self.done + self.failed + self.other
    }
}

impl fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "initial={} processing={} done={} failed={} other={}",
            self.initial, self.processing, self.done, self.failed, self.other
        )
    }
}

/// Snapshot of a collection bucketed by processing status.
///
/// Only the buckets an operator acts on carry full entries; `done` is a
/// count only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusScanReport {
    pub scan_time: String,
    pub collection_id: String,
    pub total_scanned: usize,
    pub pages_scanned: u32,
    pub estimated_pages: Option<u64>,
    /// `true` when a page error ended the scan early.
    pub truncated: bool,
    pub summary: StatusSummary,
    pub initial_files: Vec<ScannedFile>,
    pub processing_files: Vec<ScannedFile>,
    pub failed_files: Vec<ScannedFile>,
    pub other_files: Vec<ScannedFile>,
}

/// A successfully uploaded file in an [`UploadReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessfulUpload {
    pub file_path: String,
    pub file_size: u64,
    pub upload_time: f64,
    pub knowledge_file_id: Option<String>,
    /// Why the checkpoint does not list this file, if it doesn't.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_error: Option<String>,
}

/// A file whose every attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUpload {
    pub file_path: String,
    pub error: String,
    pub retry_count: u32,
}

/// Totals for an [`UploadReport`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub total_files: usize,
    pub successful_uploads: usize,
    pub failed_uploads: usize,
    pub skipped_files: usize,
    /// `true` if the run was interrupted before every task was admitted.
    pub cancelled: bool,
    /// Mean seconds per successful upload.
    pub average_upload_time: f64,
    /// Successful uploads the checkpoint failed to record.
    #[serde(default)]
    pub checkpoint_write_failures: usize,
}

impl fmt::Display for UploadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files: {} uploaded, {} failed, {} skipped (avg {:.2}s)",
            self.total_files,
            self.successful_uploads,
            self.failed_uploads,
            self.skipped_files,
            self.average_upload_time,
        )?;
        if self.checkpoint_write_failures > 0 {
            write!(f, ", {} not checkpointed", self.checkpoint_write_failures)?;
        }
        if self.cancelled {
            write!(f, ", cancelled")?;
        }
        Ok(())
    }
}

/// Final record of one upload run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReport {
    pub summary: UploadSummary,
    pub successful_files: Vec<SuccessfulUpload>,
    pub failed_files: Vec<FailedUpload>,
}

impl UploadReport {
    /// Builds the report from the run's tasks.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_tasks(tasks: &[UploadTask], cancelled: bool) -> Self {
        let successful_files: Vec<SuccessfulUpload> = tasks
            .iter()
            .filter(|t| t.status == UploadStatus::Success)
            .map(|t| SuccessfulUpload {
                file_path: t.path_key(),
                file_size: t.file_size,
                upload_time: t.upload_duration_secs.unwrap_or_default(),
                knowledge_file_id: t.remote_object_id.clone(),
                checkpoint_error: t.checkpoint_error.clone(),
            })
            .collect();

        let failed_files: Vec<FailedUpload> = tasks
            .iter()
            .filter(|t| t.status == UploadStatus::Failed)
            .map(failed_upload)
            .collect();

        let average_upload_time = if successful_files.is_empty() {
            0.0
        } else {
            successful_files.iter().map(|s| s.upload_time).sum::<f64>()
                / successful_files.len() as f64
        };

        Self {
            summary: UploadSummary {
                total_files: tasks.len(),
                successful_uploads: successful_files.len(),
                failed_uploads: failed_files.len(),
                skipped_files: tasks
                    .iter()
                    .filter(|t| t.status == UploadStatus::Skipped)
                    .count(),
                cancelled,
                average_upload_time,
                checkpoint_write_failures: successful_files
                    .iter()
                    .filter(|s| s.checkpoint_error.is_some())
                    .count(),
            },
            successful_files,
            failed_files,
        }
    }
}

/// Failure record for a task. Tasks that never ran get a placeholder error.
#[must_use]
pub fn failed_upload(task: &UploadTask) -> FailedUpload {
    FailedUpload {
        file_path: task.path_key(),
        error: task
            .error_message
            .clone()
            .unwrap_or_else(|| "not attempted".to_string()),
        retry_count: task.retry_count,
    }
}

/// A file removed from the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedFile {
    pub filename: String,
    pub knowledge_file_id: String,
}

/// A delete that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionFailure {
    pub filename: String,
    pub knowledge_file_id: String,
    pub error: String,
}

/// Outcome of a batch of deletes.
///
/// `tolerated_server_errors` are deletes answered with HTTP 500. The remote
/// removes the file anyway in that case, so they count as deleted, but they
/// are kept apart so a real server fault is still visible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionLog {
    pub timestamp: String,
    pub collection_id: String,
    /// `false` when the operator declined and nothing was deleted.
    pub confirmed: bool,
    pub deleted_files: Vec<DeletedFile>,
    pub tolerated_server_errors: Vec<DeletedFile>,
    /// HTTP 409: the file is still being processed. Not retried.
    pub skipped_conflicts: Vec<DeletionFailure>,
    pub failed_deletions: Vec<DeletionFailure>,
}

impl DeletionLog {
    /// Files that are gone from the collection, tolerated 500s included.
    pub fn removed(&self) -> impl Iterator<Item = &DeletedFile> {
        self.deleted_files
            .iter()
            .chain(self.tolerated_server_errors.iter())
    }
}

impl fmt::Display for DeletionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} deleted, {} deleted with HTTP 500, {} skipped (processing), {} failed",
            self.deleted_files.len(),
            self.tolerated_server_errors.len(),
            self.skipped_conflicts.len(),
            self.failed_deletions.len()
        )
    }
}

/// A file uploaded again by a repair action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReuploadSuccess {
    pub filename: String,
    pub file_path: String,
    pub old_knowledge_file_id: Option<String>,
    pub new_knowledge_file_id: Option<String>,
}

/// A file a repair action could not find locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnrecoverableFile {
    pub filename: String,
    pub knowledge_file_id: Option<String>,
    pub reason: String,
}

/// Outcome of a batch of re-uploads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReuploadLog {
    pub timestamp: String,
    pub collection_id: String,
    pub confirmed: bool,
    pub successful_uploads: Vec<ReuploadSuccess>,
    pub failed_uploads: Vec<FailedUpload>,
    pub unrecoverable: Vec<UnrecoverableFile>,
}

impl fmt::Display for ReuploadLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} uploaded, {} failed, {} not found locally",
            self.successful_uploads.len(),
            self.failed_uploads.len(),
            self.unrecoverable.len()
        )
    }
}

/// Delete-then-reupload of remotely failed files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixFailedLog {
    pub timestamp: String,
    pub collection_id: String,
    pub deletion: DeletionLog,
    pub reupload: ReuploadLog,
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn upload_report_counts_each_terminal_state() {
        let mut ok = UploadTask::new(PathBuf::from("/d/a.txt"), 10);
        ok.begin_attempt();
        ok.succeed(2.0, Some("1".to_string()));

        let mut ok2 = UploadTask::new(PathBuf::from("/d/b.txt"), 10);
        ok2.begin_attempt();
        ok2.succeed(4.0, None);

        let mut bad = UploadTask::new(PathBuf::from("/d/c.txt"), 10);
        bad.begin_attempt();
        bad.fail_attempt();
        bad.fail("HTTP 500");

        let mut skipped = UploadTask::new(PathBuf::from("/d/d.txt"), 10);
        skipped.skip();

        let report = UploadReport::from_tasks(&[ok, ok2, bad, skipped], false);
        assert_eq!(report.summary.total_files, 4);
        assert_eq!(report.summary.successful_uploads, 2);
        assert_eq!(report.summary.failed_uploads, 1);
        assert_eq!(report.summary.skipped_files, 1);
        assert!((report.summary.average_upload_time - 3.0).abs() < f64::EPSILON);
        assert_eq!(report.failed_files[0].retry_count, 1);
        assert_eq!(report.failed_files[0].error, "HTTP 500");
    }

    #[test]
    fn uncheckpointed_successes_are_counted() {
        let mut ok = UploadTask::new(PathBuf::from("/d/a.txt"), 10);
        ok.begin_attempt();
        ok.succeed(1.0, Some("1".to_string()));
        ok.checkpoint_error = Some("disk full".to_string());

        let report = UploadReport::from_tasks(&[ok], false);
        assert_eq!(report.summary.successful_uploads, 1);
        assert_eq!(report.summary.checkpoint_write_failures, 1);
        assert_eq!(
            report.successful_files[0].checkpoint_error.as_deref(),
            Some("disk full")
        );
        assert!(report.summary.to_string().ends_with("1 not checkpointed"));
    }

    #[test]
    fn empty_run_has_zero_average() {
        let report = UploadReport::from_tasks(&[], true);
        assert!(report.summary.average_upload_time.abs() < f64::EPSILON);
        assert!(report.summary.to_string().ends_with("cancelled"));
    }

    #[test]
    fn removed_includes_tolerated_errors() {
        let log = DeletionLog {
            deleted_files: vec![DeletedFile {
                filename: "a".into(),
                knowledge_file_id: "1".into(),
            }],
            tolerated_server_errors: vec![DeletedFile {
                filename: "b".into(),
                knowledge_file_id: "2".into(),
            }],
            ..DeletionLog::default()
        };
        let ids: Vec<&str> = log.removed().map(|d| d.knowledge_file_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn reconciliation_report_reads_back() {
        let json = r#"{
            "timestamp": "20250101_000000",
            "collection_id": "kb",
            "summary": {"total_remote_files": 3, "total_ledger_entries": 3,
                        "total_ledger_ids": 3, "missing": 1, "extra": 1,
                        "remote_listing_complete": true},
            "missing_files": [{"filename": "d.txt", "filepath": "/x/d.txt",
                               "knowledge_file_id": "4"}],
            "extra_files": [{"filename": "a.txt", "knowledge_file_id": "1"}]
        }"#;
        let report: ReconciliationReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.missing_files[0].knowledge_file_id, "4");
        assert_eq!(report.extra_files[0].created_at, "");
        assert!(report.extra_files[0].status.is_none());
    }
}
