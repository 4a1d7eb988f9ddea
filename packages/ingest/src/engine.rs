//! The upload task engine.
//!
//! A run loads the checkpoint, scans the source directory, drops every path
//! the checkpoint already lists as completed, optionally skips names that
//! already exist in the collection, and then uploads the rest.
//!
//! Concurrency is bounded by a semaphore with `max_concurrent_uploads`
//! permits. A task holds its permit for its whole presign, store upload,
//! register sequence including retries, and releases it the moment it
//! finishes so the next queued file starts immediately.
//!
//! Cancellation is cooperative. Once the token fires no further task is
//! admitted; tasks already running finish or fail normally. The checkpoint
//! is then saved with the failures and the files never started.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use kb_ingest_checkpoint::{CheckpointStore, OutputLayout};
use kb_ingest_models::progress::{NullProgress, ProgressCallback, null_progress};
use kb_ingest_models::report::UploadReport;
use kb_ingest_models::{Checkpoint, UploadConfig, UploadStatus, UploadTask};
use kb_ingest_remote::{KnowledgeBaseApi, RemoteError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::listing::collect_remote_files;
use crate::progress::ProgressTracker;
use crate::retry::RetryPolicy;
use crate::{IngestError, report, scan};

/// Result of [`UploadEngine::run`].
#[derive(Debug)]
pub struct UploadOutcome {
    /// Every task of the run, in no particular order.
    pub tasks: Vec<UploadTask>,
    /// Whether the run was interrupted before all tasks were admitted.
    pub cancelled: bool,
    pub report: UploadReport,
    /// Where the report was written, if writing succeeded.
    pub report_path: Option<PathBuf>,
}

/// Uploads files into one collection.
///
/// Cheap to clone; clones share the API client and progress callback.
#[derive(Clone)]
pub struct UploadEngine {
    api: Arc<dyn KnowledgeBaseApi>,
    config: UploadConfig,
    collection_id: String,
    progress: Arc<dyn ProgressCallback>,
}

impl UploadEngine {
    #[must_use]
    pub fn new(
        api: Arc<dyn KnowledgeBaseApi>,
        config: UploadConfig,
        collection_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            config,
            collection_id: collection_id.into(),
            progress: null_progress(),
        }
    }

    /// Reports per-file progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &UploadConfig {
        &self.config
    }

    #[must_use]
    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    #[must_use]
    pub fn api(&self) -> &dyn KnowledgeBaseApi {
        self.api.as_ref()
    }

    /// Output directory for `source_dir` in this engine's collection.
    #[must_use]
    pub fn layout(&self, source_dir: &Path) -> OutputLayout {
        OutputLayout::for_source(&self.config.output_root, source_dir, &self.collection_id)
    }

    /// Uploads every file under `source_dir` not yet in the checkpoint.
    ///
    /// Per-file failures are collected into the outcome, never returned as
    /// errors.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if `source_dir` does not exist, or
    /// [`IngestError::Checkpoint`] / [`IngestError::Io`] if the output
    /// directory or the final checkpoint cannot be written.
    pub async fn run(
        &self,
        source_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, IngestError> {
        let layout = self.layout(source_dir);
        layout.ensure().await?;
        let store = Arc::new(CheckpointStore::for_layout(&layout));

        let checkpoint = store.load().await.unwrap_or_default();
        if !checkpoint.completed_files.is_empty() {
            log::info!(
                "Resuming: checkpoint lists {} completed file(s)",
                checkpoint.completed_files.len()
            );
        }

        let dir = source_dir.to_path_buf();
        let scanned = tokio::task::spawn_blocking(move || scan::scan_directory(&dir)).await??;
        let found = scanned.len();
        let mut tasks: Vec<UploadTask> = scanned
            .into_iter()
            .filter(|t| !checkpoint.is_completed(&t.path_key()))
            .collect();
        log::info!(
            "Found {found} file(s) in {}, {} already uploaded, {} to process",
            source_dir.display(),
            found - tasks.len(),
            tasks.len()
        );

        if self.config.skip_existing_remote && !tasks.is_empty() {
            self.skip_existing_remote(&mut tasks).await;
        }

        let (tasks, cancelled) = self.execute(tasks, Some(store.clone()), cancel).await;

        store.save_final(&unresolved_delta(&tasks)).await?;

        let report = UploadReport::from_tasks(&tasks, cancelled);
        log::info!("Upload finished: {}", report.summary);

        let path = layout.report_path(report::UPLOAD_REPORT, &report::file_timestamp());
        let report_path = match report::write_json(&path, &report).await {
            Ok(()) => Some(path),
            Err(e) => {
                log::error!("Failed to write upload report {}: {e}", path.display());
                None
            }
        };

        Ok(UploadOutcome {
            tasks,
            cancelled,
            report,
            report_path,
        })
    }

    /// Runs `tasks` through the upload protocol with bounded concurrency.
    ///
    /// Already-terminal tasks (e.g. skipped) pass straight through. Returns
    /// every task along with whether cancellation stopped admission.
    pub async fn execute(
        &self,
        tasks: Vec<UploadTask>,
        store: Option<Arc<CheckpointStore>>,
        cancel: &CancellationToken,
    ) -> (Vec<UploadTask>, bool) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_uploads.max(1)));
        let tracker = Arc::new(ProgressTracker::new(
            tasks.len() as u64,
            self.progress.clone(),
        ));

        let mut finished = Vec::with_capacity(tasks.len());
        let mut join_set = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, (PathBuf, u64)> = HashMap::new();
        let mut cancelled = false;
        let mut queue = tasks.into_iter();

        for task in queue.by_ref() {
            if task.status.is_terminal() {
                tracker.record(task.status);
                finished.push(task);
                continue;
            }

            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                cancelled = true;
                finished.push(task);
                break;
            };

            while let Some(result) = join_set.try_join_next_with_id() {
                collect_joined(result, &mut in_flight, &mut finished);
            }

            let engine = self.clone();
            let store = store.clone();
            let tracker = tracker.clone();
            let key = (task.file_path.clone(), task.file_size);
            let handle = join_set.spawn(async move {
                let _permit = permit;
                let mut task = task;
                engine.upload_single(&mut task, store.as_deref()).await;
                tracker.record(task.status);
                task
            });
            in_flight.insert(handle.id(), key);
        }

        if cancelled {
            finished.extend(queue);
            log::warn!(
                "Cancellation requested: waiting for {} in-flight upload(s), not starting the rest",
                join_set.len()
            );
        }

        while let Some(result) = join_set.join_next_with_id().await {
            collect_joined(result, &mut in_flight, &mut finished);
        }

        tracker.finish();
        (finished, cancelled)
    }

    /// Uploads one file with retries, recording a success in `store` before
    /// the task is marked successful.
    ///
    /// Never returns an error: on exhaustion the task is left `Failed` with
    /// the last error message.
    pub async fn upload_single(&self, task: &mut UploadTask, store: Option<&CheckpointStore>) {
        let policy = RetryPolicy::from_config(&self.config);
        let filename = task.filename();
        let mut last_error = String::new();

        for attempt in 1..=policy.max_attempts {
            if !task.begin_attempt() {
                return;
            }
            let started = Instant::now();

            match self.attempt(task, &filename).await {
                Ok(remote_id) => {
                    let mut checkpoint_error = None;
                    if let Some(store) = store {
                        if let Err(e) = store
                            .record_success(&task.path_key(), remote_id.as_deref())
                            .await
                        {
                            log::error!(
                                "Failed to save checkpoint after uploading {filename}: {e}"
                            );
                            checkpoint_error = Some(e.to_string());
                        }
                    }
                    task.succeed(started.elapsed().as_secs_f64(), remote_id);
                    task.checkpoint_error = checkpoint_error;
                    log::debug!("Uploaded {filename} on attempt {attempt}");
                    return;
                }
                Err(e) => {
                    task.fail_attempt();
                    last_error = e.to_string();
                    if let Some(delay) = policy.delay_after(attempt) {
                        log::warn!(
                            "Attempt {attempt}/{} for {filename} failed: {e}; retrying in {delay:?}",
                            policy.max_attempts
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        log::error!("Giving up on {filename} after {attempt} attempt(s): {e}");
                    }
                }
            }
        }

        task.fail(last_error);
    }

    async fn attempt(&self, task: &UploadTask, filename: &str) -> Result<Option<String>, RemoteError> {
        let descriptor = self.api.presign(filename, task.file_size).await?;
        let key = self
            .api
            .upload_to_store(&descriptor, &task.file_path, filename, task.file_size)
            .await?;
        let records = self
            .api
            .register(&self.collection_id, &key, filename)
            .await?;
        Ok(records.into_iter().find_map(|r| r.id))
    }

    async fn skip_existing_remote(&self, tasks: &mut [UploadTask]) {
        let listing = collect_remote_files(
            self.api.as_ref(),
            &self.collection_id,
            self.config.page_size,
            None,
            &NullProgress,
        )
        .await;
        if let Some(e) = &listing.error {
            log::warn!(
                "Remote listing incomplete ({e}); duplicate-name check covers {} file(s) only",
                listing.files.len()
            );
        }

        let remote_names: BTreeSet<&str> =
            listing.files.iter().map(|f| f.filename.as_str()).collect();
        let mut skipped = 0usize;
        for task in tasks.iter_mut() {
            if remote_names.contains(task.filename().as_str()) {
                task.skip();
                skipped += 1;
            }
        }
        if skipped > 0 {
            log::info!("Skipping {skipped} file(s) already present in the collection");
        }
    }
}

fn collect_joined(
    result: Result<(tokio::task::Id, UploadTask), tokio::task::JoinError>,
    in_flight: &mut HashMap<tokio::task::Id, (PathBuf, u64)>,
    finished: &mut Vec<UploadTask>,
) {
    match result {
        Ok((id, task)) => {
            in_flight.remove(&id);
            finished.push(task);
        }
        Err(e) => {
            let Some((path, size)) = in_flight.remove(&e.id()) else {
                log::error!("Upload task failed: {e}");
                return;
            };
            log::error!("Upload task for {} failed: {e}", path.display());
            let mut task = UploadTask::new(path, size);
            task.begin_attempt();
            task.fail(e.to_string());
            finished.push(task);
        }
    }
}

/// Checkpoint delta for tasks that did not succeed: failures with their
/// errors, and files never started. Its pending list is the run's whole
/// pending set.
fn unresolved_delta(tasks: &[UploadTask]) -> Checkpoint {
    let mut delta = Checkpoint::default();
    for task in tasks {
        match task.status {
            UploadStatus::Failed => delta.record_failure(
                &task.path_key(),
                task.error_message.as_deref().unwrap_or("unknown error"),
            ),
            UploadStatus::Pending | UploadStatus::Uploading => {
                delta.pending_files.push(task.path_key());
            }
            UploadStatus::Success | UploadStatus::Skipped => {}
        }
    }
    delta
}
