//! Repair actions driven by earlier reports.
//!
//! * [`delete_extras`] removes collection entries a reconciliation report
//!   found no ledger record for.
//! * [`upload_missing`] re-uploads files the ledger has but the collection
//!   lost.
//! * [`fix_failed`] deletes entries a status scan found in the `failed`
//!   bucket and uploads them again from a local directory.
//!
//! Each action asks a [`Confirm`] first; declining returns an empty log with
//! `confirmed: false`.
//!
//! Deletes run one at a time with `delete_pause` between calls. The delete
//! endpoint answers some successful deletes with HTTP 500; those are counted
//! as removed but listed under `tolerated_server_errors`. HTTP 409 means the
//! file is still processing and is skipped without retry.

use std::path::{Path, PathBuf};

use kb_ingest_checkpoint::CheckpointStore;
use kb_ingest_models::confirm::Confirm;
use kb_ingest_models::report::{
    DeletedFile, DeletionFailure, DeletionLog, FixFailedLog, ReconciliationReport,
    ReuploadLog, ReuploadSuccess, StatusScanReport, UnrecoverableFile, failed_upload,
};
use kb_ingest_models::{UploadConfig, UploadStatus, UploadTask};
use kb_ingest_remote::{KnowledgeBaseApi, RemoteError};

use crate::{IngestError, UploadEngine, report};

/// How a single delete ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// 2xx.
    Deleted,
    /// HTTP 500; the remote removes the file regardless.
    ToleratedServerError,
    /// HTTP 409; still processing.
    Conflict(String),
    Failed(String),
}

#[must_use]
pub fn classify_delete(result: &Result<(), RemoteError>) -> DeleteOutcome {
    match result {
        Ok(()) => DeleteOutcome::Deleted,
        Err(e) => match e.status() {
            Some(500) => DeleteOutcome::ToleratedServerError,
            Some(409) => DeleteOutcome::Conflict(e.to_string()),
            _ => DeleteOutcome::Failed(e.to_string()),
        },
    }
}

fn new_deletion_log(collection_id: &str, confirmed: bool) -> DeletionLog {
    DeletionLog {
        timestamp: report::now_rfc3339(),
        collection_id: collection_id.to_string(),
        confirmed,
        ..DeletionLog::default()
    }
}

fn new_reupload_log(collection_id: &str, confirmed: bool) -> ReuploadLog {
    ReuploadLog {
        timestamp: report::now_rfc3339(),
        collection_id: collection_id.to_string(),
        confirmed,
        ..ReuploadLog::default()
    }
}

async fn delete_targets(
    api: &dyn KnowledgeBaseApi,
    config: &UploadConfig,
    collection_id: &str,
    targets: Vec<DeletedFile>,
) -> DeletionLog {
    let mut outcome = new_deletion_log(collection_id, true);
    let pause = config.delete_pause();
    let total = targets.len();

    for (i, target) in targets.into_iter().enumerate() {
        if i > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        let result = api
            .delete_file(collection_id, &target.knowledge_file_id)
            .await;
        match classify_delete(&result) {
            DeleteOutcome::Deleted => {
                log::info!(
                    "[{}/{total}] Deleted {} ({})",
                    i + 1,
                    target.filename,
                    target.knowledge_file_id
                );
                outcome.deleted_files.push(target);
            }
            DeleteOutcome::ToleratedServerError => {
                log::warn!(
                    "[{}/{total}] Delete of {} ({}) returned HTTP 500; treating as deleted",
                    i + 1,
                    target.filename,
                    target.knowledge_file_id
                );
                outcome.tolerated_server_errors.push(target);
            }
            DeleteOutcome::Conflict(error) => {
                log::warn!(
                    "[{}/{total}] {} ({}) is still processing, skipped",
                    i + 1,
                    target.filename,
                    target.knowledge_file_id
                );
                outcome.skipped_conflicts.push(DeletionFailure {
                    filename: target.filename,
                    knowledge_file_id: target.knowledge_file_id,
                    error,
                });
            }
            DeleteOutcome::Failed(error) => {
                log::error!(
                    "[{}/{total}] Failed to delete {} ({}): {error}",
                    i + 1,
                    target.filename,
                    target.knowledge_file_id
                );
                outcome.failed_deletions.push(DeletionFailure {
                    filename: target.filename,
                    knowledge_file_id: target.knowledge_file_id,
                    error,
                });
            }
        }
    }

    outcome
}

/// Deletes every `extra_files` entry of `report` from its collection.
pub async fn delete_extras(
    api: &dyn KnowledgeBaseApi,
    config: &UploadConfig,
    report: &ReconciliationReport,
    confirm: &dyn Confirm,
) -> DeletionLog {
    let collection_id = report.collection_id.as_str();
    if report.extra_files.is_empty() {
        log::info!("No extra files to delete");
        return new_deletion_log(collection_id, true);
    }

    let prompt = format!(
        "Delete {} file(s) from collection {collection_id}?",
        report.extra_files.len()
    );
    if !confirm.confirm(&prompt) {
        log::info!("Deletion cancelled");
        return new_deletion_log(collection_id, false);
    }

    let targets = report
        .extra_files
        .iter()
        .map(|f| DeletedFile {
            filename: f.filename.clone(),
            knowledge_file_id: f.knowledge_file_id.clone(),
        })
        .collect();
    let outcome = delete_targets(api, config, collection_id, targets).await;
    log::info!("Delete extras: {outcome}");
    outcome
}

/// Returns `path` if it names an existing regular file.
async fn existing_file(path: &Path) -> Option<(PathBuf, u64)> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Some((path.to_path_buf(), meta.len())),
        _ => None,
    }
}

/// Uploads one local file and files the result into `outcome`.
async fn reupload(
    engine: &UploadEngine,
    outcome: &mut ReuploadLog,
    path: PathBuf,
    size: u64,
    old_id: Option<String>,
    store: Option<&CheckpointStore>,
) {
    let mut task = UploadTask::new(path, size);
    engine.upload_single(&mut task, store).await;

    if task.status == UploadStatus::Success {
        log::info!("Re-uploaded {}", task.filename());
        outcome.successful_uploads.push(ReuploadSuccess {
            filename: task.filename(),
            file_path: task.path_key(),
            old_knowledge_file_id: old_id,
            new_knowledge_file_id: task.remote_object_id.clone(),
        });
    } else {
        outcome.failed_uploads.push(failed_upload(&task));
    }
}

/// Re-uploads every `missing_files` entry of `report`.
///
/// Each entry is looked up at its remembered path first and then, if
/// `files_dir` is given, as `files_dir/<filename>`. Successes are recorded
/// in `store` when one is given, replacing the entry's old id in the
/// ledger, or removing it when registration returns no new id.
pub async fn upload_missing(
    engine: &UploadEngine,
    report: &ReconciliationReport,
    files_dir: Option<&Path>,
    store: Option<&CheckpointStore>,
    confirm: &dyn Confirm,
) -> ReuploadLog {
    let collection_id = report.collection_id.as_str();
    if report.missing_files.is_empty() {
        log::info!("No missing files to upload");
        return new_reupload_log(collection_id, true);
    }

    let prompt = format!(
        "Upload {} missing file(s) to collection {collection_id}?",
        report.missing_files.len()
    );
    if !confirm.confirm(&prompt) {
        log::info!("Upload cancelled");
        return new_reupload_log(collection_id, false);
    }

    let mut outcome = new_reupload_log(collection_id, true);
    for missing in &report.missing_files {
        let mut found = None;
        if !missing.filepath.is_empty() {
            found = existing_file(Path::new(&missing.filepath)).await;
        }
        if found.is_none() {
            if let Some(dir) = files_dir {
                found = existing_file(&dir.join(&missing.filename)).await;
            }
        }

        let Some((path, size)) = found else {
            log::warn!("{} not found locally, cannot re-upload", missing.filename);
            outcome.unrecoverable.push(UnrecoverableFile {
                filename: missing.filename.clone(),
                knowledge_file_id: Some(missing.knowledge_file_id.clone()),
                reason: format!("not found at {}", missing.filepath),
            });
            continue;
        };

        reupload(
            engine,
            &mut outcome,
            path,
            size,
            Some(missing.knowledge_file_id.clone()),
            store,
        )
        .await;
    }

    log::info!("Upload missing: {outcome}");
    outcome
}

/// Deletes the `failed_files` of a status scan, then uploads each removed
/// file again from `files_dir` by file name.
pub async fn fix_failed(
    engine: &UploadEngine,
    report: &StatusScanReport,
    files_dir: &Path,
    confirm: &dyn Confirm,
) -> FixFailedLog {
    let collection_id = report.collection_id.as_str();
    let mut result = FixFailedLog {
        timestamp: report::now_rfc3339(),
        collection_id: collection_id.to_string(),
        deletion: new_deletion_log(collection_id, true),
        reupload: new_reupload_log(collection_id, true),
    };

    if report.failed_files.is_empty() {
        log::info!("No failed files to fix");
        return result;
    }

    let prompt = format!(
        "Delete {} failed file(s) from collection {collection_id} and upload them again from {}?",
        report.failed_files.len(),
        files_dir.display()
    );
    if !confirm.confirm(&prompt) {
        log::info!("Fix cancelled");
        result.deletion.confirmed = false;
        result.reupload.confirmed = false;
        return result;
    }

    let targets = report
        .failed_files
        .iter()
        .map(|f| DeletedFile {
            filename: f.filename.clone(),
            knowledge_file_id: f.id.clone(),
        })
        .collect();
    result.deletion =
        delete_targets(engine.api(), engine.config(), collection_id, targets).await;
    log::info!("Fix failed, deletion: {}", result.deletion);

    let removed: Vec<DeletedFile> = result.deletion.removed().cloned().collect();
    for file in removed {
        let Some((path, size)) = existing_file(&files_dir.join(&file.filename)).await else {
            log::warn!(
                "{} not found in {}, cannot re-upload",
                file.filename,
                files_dir.display()
            );
            result.reupload.unrecoverable.push(UnrecoverableFile {
                filename: file.filename,
                knowledge_file_id: Some(file.knowledge_file_id),
                reason: format!("not found in {}", files_dir.display()),
            });
            continue;
        };
        reupload(
            engine,
            &mut result.reupload,
            path,
            size,
            Some(file.knowledge_file_id),
            None,
        )
        .await;
    }

    log::info!("Fix failed, upload: {}", result.reupload);
    result
}

fn ensure_collection(report_collection: &str, expected: &str) -> Result<(), IngestError> {
    if report_collection == expected {
        Ok(())
    } else {
        Err(IngestError::Config {
            message: format!(
                "report is for collection {report_collection}, not {expected}"
            ),
        })
    }
}

/// Where a repair log for the report at `report_path` goes: next to it.
fn log_path(report_path: &Path, prefix: &str) -> PathBuf {
    report_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!("{prefix}_{}.json", report::file_timestamp()))
}

/// Reads a reconciliation report, deletes its extras, and writes the
/// deletion log next to the report.
///
/// # Errors
///
/// Returns [`IngestError`] if the report cannot be read, belongs to a
/// different collection, or the log cannot be written.
pub async fn run_delete_extras(
    api: &dyn KnowledgeBaseApi,
    config: &UploadConfig,
    collection_id: &str,
    report_path: &Path,
    confirm: &dyn Confirm,
) -> Result<(DeletionLog, PathBuf), IngestError> {
    let report: ReconciliationReport = report::read_json(report_path).await?;
    ensure_collection(&report.collection_id, collection_id)?;

    let outcome = delete_extras(api, config, &report, confirm).await;
    let path = log_path(report_path, report::DELETION_LOG);
    report::write_json(&path, &outcome).await?;
    Ok((outcome, path))
}

/// Reads a reconciliation report, re-uploads its missing files, and writes
/// the upload log next to the report.
///
/// With `source_dir`, successes are recorded in that directory's
/// checkpoint.
///
/// # Errors
///
/// Returns [`IngestError`] if the report cannot be read, belongs to a
/// different collection, or the log cannot be written.
pub async fn run_upload_missing(
    engine: &UploadEngine,
    report_path: &Path,
    files_dir: Option<&Path>,
    source_dir: Option<&Path>,
    confirm: &dyn Confirm,
) -> Result<(ReuploadLog, PathBuf), IngestError> {
    let report: ReconciliationReport = report::read_json(report_path).await?;
    ensure_collection(&report.collection_id, engine.collection_id())?;

    let store = source_dir.map(|dir| CheckpointStore::for_layout(&engine.layout(dir)));
    let outcome = upload_missing(engine, &report, files_dir, store.as_ref(), confirm).await;
    let path = log_path(report_path, report::REUPLOAD_LOG);
    report::write_json(&path, &outcome).await?;
    Ok((outcome, path))
}

/// Reads a status scan report, replaces its failed files, and writes the
/// combined log next to the report.
///
/// # Errors
///
/// Returns [`IngestError::Config`] if `files_dir` is not a directory or the
/// report belongs to a different collection, and other [`IngestError`]s if
/// the report cannot be read or the log cannot be written.
pub async fn run_fix_failed(
    engine: &UploadEngine,
    report_path: &Path,
    files_dir: &Path,
    confirm: &dyn Confirm,
) -> Result<(FixFailedLog, PathBuf), IngestError> {
    if !tokio::fs::metadata(files_dir)
        .await
        .is_ok_and(|m| m.is_dir())
    {
        return Err(IngestError::Config {
            message: format!("{} is not a directory", files_dir.display()),
        });
    }

    let report: StatusScanReport = report::read_json(report_path).await?;
    ensure_collection(&report.collection_id, engine.collection_id())?;

    let outcome = fix_failed(engine, &report, files_dir, confirm).await;
    let path = log_path(report_path, report::FIX_FAILED_LOG);
    report::write_json(&path, &outcome).await?;
    Ok((outcome, path))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kb_ingest_models::Checkpoint;
    use kb_ingest_models::confirm::AutoConfirm;
    use kb_ingest_models::progress::NullProgress;
    use kb_ingest_models::report::{ExtraFile, MissingFile, ReconciliationSummary};

    use super::*;
    use crate::status_scan::scan_status;
    use crate::test_support::{FakeKnowledgeBase, scratch_dir, write_files};

    fn quick_config(output_root: &Path) -> UploadConfig {
        UploadConfig {
            retry_delay_secs: 0.0,
            delete_pause_ms: 0,
            output_root: output_root.to_path_buf(),
            ..UploadConfig::default()
        }
    }

    fn extra(id: &str, filename: &str) -> ExtraFile {
        ExtraFile {
            filename: filename.to_string(),
            knowledge_file_id: id.to_string(),
            created_at: String::new(),
            status: None,
        }
    }

    fn reconciliation(
        extra_files: Vec<ExtraFile>,
        missing_files: Vec<MissingFile>,
    ) -> ReconciliationReport {
        ReconciliationReport {
            timestamp: String::new(),
            collection_id: "kb".to_string(),
            summary: ReconciliationSummary::default(),
            missing_files,
            extra_files,
        }
    }

    #[test]
    fn delete_results_are_classified_by_status() {
        let status = |status| {
            Err(RemoteError::Status {
                status,
                body: String::new(),
            })
        };
        assert_eq!(classify_delete(&Ok(())), DeleteOutcome::Deleted);
        assert_eq!(
            classify_delete(&status(500)),
            DeleteOutcome::ToleratedServerError
        );
        assert!(matches!(
            classify_delete(&status(409)),
            DeleteOutcome::Conflict(_)
        ));
        assert!(matches!(
            classify_delete(&status(404)),
            DeleteOutcome::Failed(_)
        ));
        assert!(matches!(
            classify_delete(&Err(RemoteError::InvalidResponse {
                message: "x".to_string()
            })),
            DeleteOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn delete_extras_sorts_each_outcome() {
        let fake = FakeKnowledgeBase::default();
        fake.seed_remote((1..=4).map(|i| (i.to_string(), format!("f{i}.txt"), "done")));
        fake.delete_status("2", 500);
        fake.delete_status("3", 409);

        let report = reconciliation(
            vec![
                extra("1", "f1.txt"),
                extra("2", "f2.txt"),
                extra("3", "f3.txt"),
                extra("9", "gone.txt"),
            ],
            Vec::new(),
        );
        let config = quick_config(Path::new("unused"));
        let outcome = delete_extras(&fake, &config, &report, &AutoConfirm(true)).await;

        assert!(outcome.confirmed);
        assert_eq!(outcome.deleted_files.len(), 1);
        assert_eq!(outcome.deleted_files[0].knowledge_file_id, "1");
        assert_eq!(outcome.tolerated_server_errors.len(), 1);
        assert_eq!(outcome.tolerated_server_errors[0].knowledge_file_id, "2");
        assert_eq!(outcome.skipped_conflicts.len(), 1);
        assert_eq!(outcome.skipped_conflicts[0].knowledge_file_id, "3");
        assert_eq!(outcome.failed_deletions.len(), 1);
        assert_eq!(outcome.failed_deletions[0].knowledge_file_id, "9");
        assert_eq!(outcome.removed().count(), 2);

        assert_eq!(fake.delete_calls(), vec!["1", "2", "3", "9"]);
        assert_eq!(fake.remote_ids(), vec!["3", "4"]);
    }

    #[tokio::test]
    async fn declined_delete_touches_nothing() {
        let fake = FakeKnowledgeBase::default();
        fake.seed_remote([("1".to_string(), "a.txt".to_string(), "done")]);

        let report = reconciliation(vec![extra("1", "a.txt")], Vec::new());
        let config = quick_config(Path::new("unused"));
        let outcome = delete_extras(&fake, &config, &report, &AutoConfirm(false)).await;

        assert!(!outcome.confirmed);
        assert!(outcome.deleted_files.is_empty());
        assert!(fake.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn upload_missing_resolves_paths_and_reports_unrecoverable() {
        let root = scratch_dir("kb_ingest_repair_missing");
        let source = root.join("docs");
        let fallback = root.join("fallback");
        write_files(&source, &[("a.txt", "a")]);
        write_files(&fallback, &[("b.txt", "b")]);

        let fake = Arc::new(FakeKnowledgeBase::default());
        let engine = UploadEngine::new(fake.clone(), quick_config(&root.join("out")), "kb");
        let store = CheckpointStore::new(root.join("checkpoint.json"));

        let a_path = source.join("a.txt").to_string_lossy().into_owned();
        let report = reconciliation(
            Vec::new(),
            vec![
                MissingFile {
                    filename: "a.txt".to_string(),
                    filepath: a_path.clone(),
                    knowledge_file_id: "old-a".to_string(),
                },
                MissingFile {
                    filename: "b.txt".to_string(),
                    filepath: "/nowhere/b.txt".to_string(),
                    knowledge_file_id: "old-b".to_string(),
                },
                MissingFile {
                    filename: "c.txt".to_string(),
                    filepath: "/nowhere/c.txt".to_string(),
                    knowledge_file_id: "old-c".to_string(),
                },
            ],
        );

        let outcome = upload_missing(
            &engine,
            &report,
            Some(&fallback),
            Some(&store),
            &AutoConfirm(true),
        )
        .await;

        assert_eq!(outcome.successful_uploads.len(), 2);
        assert!(outcome.failed_uploads.is_empty());
        assert_eq!(outcome.unrecoverable.len(), 1);
        assert_eq!(outcome.unrecoverable[0].filename, "c.txt");
        assert_eq!(outcome.unrecoverable[0].knowledge_file_id.as_deref(), Some("old-c"));

        let a = &outcome.successful_uploads[0];
        assert_eq!(a.file_path, a_path);
        assert_eq!(a.old_knowledge_file_id.as_deref(), Some("old-a"));
        assert!(a.new_knowledge_file_id.is_some());
        assert!(outcome.successful_uploads[1].file_path.ends_with("b.txt"));

        let checkpoint: Checkpoint = store.load().await.unwrap();
        assert_eq!(
            checkpoint.file_id_mapping.get(&a_path),
            a.new_knowledge_file_id.as_ref()
        );
        assert_eq!(fake.presign_calls(), vec!["a.txt", "b.txt"]);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn reupload_without_new_id_drops_the_stale_one() {
        let root = scratch_dir("kb_ingest_repair_no_new_id");
        let source = root.join("docs");
        write_files(&source, &[("a.txt", "a")]);

        let fake = Arc::new(FakeKnowledgeBase::default());
        fake.omit_ids();
        let engine = UploadEngine::new(fake.clone(), quick_config(&root.join("out")), "kb");
        let store = CheckpointStore::new(root.join("checkpoint.json"));

        let a_path = source.join("a.txt").to_string_lossy().into_owned();
        store.record_success(&a_path, Some("old-a")).await.unwrap();

        let report = reconciliation(
            Vec::new(),
            vec![MissingFile {
                filename: "a.txt".to_string(),
                filepath: a_path.clone(),
                knowledge_file_id: "old-a".to_string(),
            }],
        );
        let outcome =
            upload_missing(&engine, &report, None, Some(&store), &AutoConfirm(true)).await;
        assert_eq!(outcome.successful_uploads.len(), 1);
        assert!(outcome.successful_uploads[0].new_knowledge_file_id.is_none());

        let checkpoint = store.load().await.unwrap();
        assert!(checkpoint.is_completed(&a_path));
        assert!(!checkpoint.believed_uploaded_ids().contains("old-a"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn fix_failed_deletes_then_reuploads_by_name() {
        let root = scratch_dir("kb_ingest_repair_fix_failed");
        let files = root.join("files");
        write_files(&files, &[("bad1.txt", "1"), ("bad3.txt", "3")]);

        let fake = Arc::new(FakeKnowledgeBase::default());
        fake.seed_remote([
            ("1".to_string(), "bad1.txt".to_string(), "failed"),
            ("2".to_string(), "bad2.txt".to_string(), "failed"),
            ("3".to_string(), "bad3.txt".to_string(), "failed"),
            ("4".to_string(), "ok.txt".to_string(), "done"),
        ]);
        fake.delete_status("3", 500);

        let engine = UploadEngine::new(fake.clone(), quick_config(&root.join("out")), "kb");
        let scan = scan_status(fake.as_ref(), "kb", 100, None, &NullProgress).await;
        assert_eq!(scan.failed_files.len(), 3);

        let outcome = fix_failed(&engine, &scan, &files, &AutoConfirm(true)).await;

        assert_eq!(outcome.deletion.deleted_files.len(), 2);
        assert_eq!(outcome.deletion.tolerated_server_errors.len(), 1);
        assert_eq!(outcome.reupload.successful_uploads.len(), 2);
        assert_eq!(outcome.reupload.unrecoverable.len(), 1);
        assert_eq!(outcome.reupload.unrecoverable[0].filename, "bad2.txt");

        let names: Vec<&str> = outcome
            .reupload
            .successful_uploads
            .iter()
            .map(|s| s.filename.as_str())
            .collect();
        assert_eq!(names, vec!["bad1.txt", "bad3.txt"]);

        let remote = fake.remote_ids();
        assert!(!remote.contains(&"1".to_string()));
        assert!(!remote.contains(&"2".to_string()));
        assert!(remote.contains(&"4".to_string()));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn report_for_another_collection_is_rejected() {
        let root = scratch_dir("kb_ingest_repair_wrong_collection");
        let report_path = root.join("integrity_check_20250101_000000.json");
        let report = reconciliation(vec![extra("1", "a.txt")], Vec::new());
        report::write_json(&report_path, &report).await.unwrap();

        let fake = FakeKnowledgeBase::default();
        let config = quick_config(&root);
        let err = run_delete_extras(&fake, &config, "other", &report_path, &AutoConfirm(true))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Config { .. }));
        assert!(fake.delete_calls().is_empty());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn run_delete_extras_writes_log_next_to_report() {
        let root = scratch_dir("kb_ingest_repair_delete_log");
        let report_path = root.join("integrity_check_20250101_000000.json");
        report::write_json(
            &report_path,
            &reconciliation(vec![extra("1", "a.txt")], Vec::new()),
        )
        .await
        .unwrap();

        let fake = FakeKnowledgeBase::default();
        fake.seed_remote([("1".to_string(), "a.txt".to_string(), "done")]);
        let config = quick_config(&root);

        let (outcome, path) =
            run_delete_extras(&fake, &config, "kb", &report_path, &AutoConfirm(true))
                .await
                .unwrap();
        assert_eq!(outcome.deleted_files.len(), 1);
        assert_eq!(path.parent(), Some(root.as_path()));
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(report::DELETION_LOG)
        );

        let _ = std::fs::remove_dir_all(&root);
    }
}
