#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Upload configuration, task, checkpoint, and report types.

pub mod checkpoint;
pub mod confirm;
pub mod progress;
pub mod report;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use checkpoint::{Checkpoint, FailedFile};

/// Tuning knobs for an upload run and the repair actions.
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum number of files in the presign/upload/register sequence at
    /// once.
    pub max_concurrent_uploads: usize,
    /// Attempts per file before it is marked failed.
    pub max_retries: u32,
    /// Base delay between attempts. Attempt `n` waits `n` times this.
    pub retry_delay_secs: f64,
    /// Timeout applied to every remote call.
    pub timeout_secs: u64,
    /// Skip local files whose name already exists in the collection.
    pub skip_existing_remote: bool,
    /// Page size used when listing the collection.
    pub page_size: u32,
    /// Pause between sequential delete calls.
    pub delete_pause_ms: u64,
    /// Root directory for checkpoints, logs, and reports.
    pub output_root: PathBuf,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_uploads: 10,
            max_retries: 3,
            retry_delay_secs: 2.0,
            timeout_secs: 300,
            skip_existing_remote: true,
            page_size: 100,
            delete_pause_ms: 500,
            output_root: PathBuf::from("upload_outputs"),
        }
    }
}

impl UploadConfig {
    /// Base retry delay as a [`Duration`]. Negative values clamp to zero.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay_secs.max(0.0))
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Pause between delete calls.
    #[must_use]
    pub const fn delete_pause(&self) -> Duration {
        Duration::from_millis(self.delete_pause_ms)
    }
}

/// Lifecycle state of an [`UploadTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Queued, no attempt made yet.
    Pending,
    /// An attempt is in progress, or a retry is scheduled.
    Uploading,
    /// Registered with the collection.
    Success,
    /// Every attempt failed.
    Failed,
    /// Not attempted because the collection already has a file by this name.
    Skipped,
}

impl UploadStatus {
    /// Whether the task has reached a final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }
}

/// One local file's journey through presign, store upload, and register.
///
/// State only moves forward: `Pending` to `Uploading` to `Success` or
/// `Failed`, or `Pending` straight to `Skipped`. Calls that would move a
/// task backwards are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTask {
    /// Local path, unique within a run.
    pub file_path: PathBuf,
    /// Size in bytes at scan time.
    pub file_size: u64,
    /// Current state.
    pub status: UploadStatus,
    /// Last error, set only once the task has failed.
    pub error_message: Option<String>,
    /// Number of failed attempts.
    pub retry_count: u32,
    /// Wall time of the successful attempt.
    pub upload_duration_secs: Option<f64>,
    /// Catalog id from registration, when the response carried one.
    pub remote_object_id: Option<String>,
    /// Set when the upload succeeded but recording it in the checkpoint
    /// failed, so the ledger lags the collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_error: Option<String>,
}

impl UploadTask {
    #[must_use]
    pub const fn new(file_path: PathBuf, file_size: u64) -> Self {
        Self {
            file_path,
            file_size,
            status: UploadStatus::Pending,
            error_message: None,
            retry_count: 0,
            upload_duration_secs: None,
            remote_object_id: None,
            checkpoint_error: None,
        }
    }

    /// Basename used as the remote filename.
    #[must_use]
    pub fn filename(&self) -> String {
        file_name_of(&self.file_path)
    }

    /// Path as stored in the checkpoint.
    #[must_use]
    pub fn path_key(&self) -> String {
        self.file_path.to_string_lossy().into_owned()
    }

    /// Marks the start of an attempt. Returns `false` if the task is already
    /// terminal.
    pub const fn begin_attempt(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = UploadStatus::Uploading;
        true
    }

    /// Records a failed attempt without ending the task.
    pub const fn fail_attempt(&mut self) {
        if matches!(self.status, UploadStatus::Uploading) {
            self.retry_count += 1;
        }
    }

    /// Marks the task successful.
    pub fn succeed(&mut self, duration_secs: f64, remote_object_id: Option<String>) {
        if matches!(self.status, UploadStatus::Uploading) {
            self.status = UploadStatus::Success;
            self.upload_duration_secs = Some(duration_secs);
            self.remote_object_id = remote_object_id;
            self.error_message = None;
        }
    }

    /// Marks the task failed with its last error.
    pub fn fail(&mut self, error: impl Into<String>) {
        if matches!(
            self.status,
            UploadStatus::Pending | UploadStatus::Uploading
        ) {
            self.status = UploadStatus::Failed;
            self.error_message = Some(error.into());
        }
    }

    /// Marks a task that was never attempted as skipped.
    pub const fn skip(&mut self) {
        if matches!(self.status, UploadStatus::Pending) {
            self.status = UploadStatus::Skipped;
        }
    }
}

/// Basename of `path`, or the whole path when it has none.
#[must_use]
pub fn file_name_of(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.to_string_lossy().into_owned(),
        |name| name.to_string_lossy().into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> UploadTask {
        UploadTask::new(PathBuf::from("/data/docs/a.txt"), 12)
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = UploadConfig::default();
        assert_eq!(config.max_concurrent_uploads, 10);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
        assert_eq!(config.timeout(), Duration::from_secs(300));
        assert_eq!(config.delete_pause(), Duration::from_millis(500));
        assert!(config.skip_existing_remote);
    }

    #[test]
    fn retry_then_success_keeps_failed_attempt_count() {
        let mut t = task();
        assert!(t.begin_attempt());
        t.fail_attempt();
        assert!(t.begin_attempt());
        t.fail_attempt();
        assert!(t.begin_attempt());
        t.succeed(0.5, Some("id-1".to_string()));

        assert_eq!(t.status, UploadStatus::Success);
        assert_eq!(t.retry_count, 2);
        assert_eq!(t.remote_object_id.as_deref(), Some("id-1"));
        assert!(t.error_message.is_none());
    }

    #[test]
    fn terminal_states_do_not_move() {
        let mut t = task();
        t.begin_attempt();
        t.fail("boom");
        assert!(!t.begin_attempt());
        t.succeed(1.0, None);
        t.skip();
        assert_eq!(t.status, UploadStatus::Failed);
        assert_eq!(t.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn skip_only_applies_to_pending() {
        let mut t = task();
        t.skip();
        assert_eq!(t.status, UploadStatus::Skipped);

        let mut started = task();
        started.begin_attempt();
        started.skip();
        assert_eq!(started.status, UploadStatus::Uploading);
    }

    #[test]
    fn filename_is_basename() {
        assert_eq!(task().filename(), "a.txt");
        assert_eq!(task().path_key(), "/data/docs/a.txt");
    }
}
