#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Durable upload checkpoints.
//!
//! Each source directory and collection pair gets its own output directory
//! (see [`OutputLayout`]) holding one checkpoint file. [`CheckpointStore`]
//! serializes every read-merge-write of that file behind a single async
//! mutex and replaces it atomically, so concurrent upload tasks never lose
//! each other's updates and a crash mid-write leaves the previous version
//! intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use kb_ingest_models::Checkpoint;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// File name of the checkpoint inside `checkpoints/`.
pub const CHECKPOINT_FILE: &str = "upload_checkpoint.json";

/// Completed-file interval at which saves are logged at `info`.
const INFO_LOG_INTERVAL: usize = 100;

/// Errors that can occur while writing a checkpoint.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Reading, writing, or renaming the checkpoint file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing the checkpoint failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output directory for one source directory and collection.
///
/// `<output_root>/<source basename>_<first 8 chars of collection id>/` with
/// `checkpoints/`, `logs/`, and `reports/` underneath. The name depends only
/// on its inputs, so re-running against the same directory and collection
/// finds the same checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    #[must_use]
    pub fn for_source(output_root: &Path, source_dir: &Path, collection_id: &str) -> Self {
        let basename = source_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "default".to_string());
        let prefix: String = collection_id.chars().take(8).collect();
        Self {
            root: output_root.join(format!("{basename}_{prefix}")),
        }
    }

    /// Layout for collection-wide commands that have no source directory,
    /// e.g. a status scan: `<output_root>/collection_<prefix>/`.
    #[must_use]
    pub fn for_collection(output_root: &Path, collection_id: &str) -> Self {
        let prefix: String = collection_id.chars().take(8).collect();
        Self {
            root: output_root.join(format!("collection_{prefix}")),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    #[must_use]
    pub fn report_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint_dir().join(CHECKPOINT_FILE)
    }

    /// Path of the log file for an upload run started at `timestamp`.
    #[must_use]
    pub fn log_path(&self, timestamp: &str) -> PathBuf {
        self.log_dir().join(format!("upload_log_{timestamp}.log"))
    }

    /// Path of a report named `<prefix>_<timestamp>.json`.
    #[must_use]
    pub fn report_path(&self, prefix: &str, timestamp: &str) -> PathBuf {
        self.report_dir().join(format!("{prefix}_{timestamp}.json"))
    }

    /// Creates all three subdirectories.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if a directory cannot be created.
    pub async fn ensure(&self) -> std::io::Result<()> {
        for dir in [self.checkpoint_dir(), self.log_dir(), self.report_dir()] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }
}

/// Merge-on-save checkpoint file.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CheckpointStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store for the checkpoint file of `layout`.
    #[must_use]
    pub fn for_layout(layout: &OutputLayout) -> Self {
        Self::new(layout.checkpoint_path())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the checkpoint.
    ///
    /// Returns `None` when there is no file or it cannot be read or parsed.
    /// A corrupt checkpoint is logged and otherwise ignored; the caller
    /// falls back to a full scan.
    pub async fn load(&self) -> Option<Checkpoint> {
        let _guard = self.lock.lock().await;
        match self.read_for_update().await {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                log::warn!("Failed to read checkpoint {}: {e}", self.path.display());
                None
            }
        }
    }

    /// Merges `delta` into the checkpoint on disk and writes the result.
    ///
    /// The read, merge, and write happen under one lock. The merged
    /// checkpoint is written to a temporary file, synced, and renamed over
    /// the real one.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the file on disk exists but cannot be
    /// read, or if the merged checkpoint cannot be serialized or written.
    /// The previous file is left untouched.
    pub async fn save(&self, delta: &Checkpoint) -> Result<Checkpoint, CheckpointError> {
        self.update(|checkpoint| checkpoint.merge(delta)).await
    }

    /// Like [`Self::save`], but `delta.pending_files` replaces the pending
    /// list on disk instead of being merged into it. Used at the end of a
    /// run, when the run's unresolved queue is the whole pending set.
    ///
    /// # Errors
    ///
    /// See [`Self::save`].
    pub async fn save_final(&self, delta: &Checkpoint) -> Result<Checkpoint, CheckpointError> {
        self.update(|checkpoint| {
            checkpoint.merge(delta);
            checkpoint.replace_pending(&delta.pending_files);
        })
        .await
    }

    /// Records one successful upload.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the checkpoint cannot be read or
    /// written.
    pub async fn record_success(
        &self,
        path: &str,
        remote_id: Option<&str>,
    ) -> Result<Checkpoint, CheckpointError> {
        let merged = self
            .update(|checkpoint| checkpoint.record_success(path, remote_id))
            .await?;

        let completed = merged.completed_files.len();
        if completed % INFO_LOG_INTERVAL == 0 {
            log::info!("Checkpoint saved: {completed} files completed");
        } else {
            log::debug!("Checkpoint saved: {completed} files completed ({path})");
        }
        Ok(merged)
    }

    async fn update(
        &self,
        apply: impl FnOnce(&mut Checkpoint) + Send,
    ) -> Result<Checkpoint, CheckpointError> {
        let _guard = self.lock.lock().await;

        let mut checkpoint = self.read_for_update().await?.unwrap_or_default();
        apply(&mut checkpoint);
        checkpoint.touch();

        self.write_atomic(&checkpoint).await?;
        Ok(checkpoint)
    }

    /// Reads the file on disk. A missing or unparsable file is `None`; any
    /// other I/O error is returned so the caller does not overwrite a
    /// checkpoint it could not see.
    async fn read_for_update(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable checkpoint {}: {e}",
                    self.path.display()
                );
                Ok(None)
            }
        }
    }

    async fn write_atomic(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(checkpoint)?;
        let tmp = tmp_path(&self.path);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
