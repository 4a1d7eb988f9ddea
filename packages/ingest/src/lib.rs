#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resumable bulk uploads into a knowledge base.
//!
//! The [`engine`] walks a source directory, skips whatever the checkpoint
//! already records as uploaded, and drives every remaining file through
//! presign, object store upload, and registration with a bounded number of
//! files in flight. Each success is written to the checkpoint before the
//! file counts as done, so an interrupted run resumes where it stopped.
//!
//! After (or independently of) a run, [`reconcile`] diffs the checkpoint's
//! id ledger against the collection's listing, [`status_scan`] buckets the
//! collection by processing status, and [`repair`] acts on either report:
//! deleting extras, re-uploading missing files, or replacing files that
//! failed remote processing.

pub mod commands;
pub mod config;
pub mod engine;
pub mod interactive;
pub mod listing;
pub mod progress;
pub mod reconcile;
pub mod repair;
pub mod report;
pub mod retry;
pub mod scan;
pub mod status_scan;

#[cfg(test)]
pub(crate) mod test_support;

use kb_ingest_checkpoint::CheckpointError;
use kb_ingest_remote::RemoteError;

pub use engine::{UploadEngine, UploadOutcome};

/// Errors that can end an ingest command.
///
/// Per-file upload and delete failures are not errors; they are collected
/// into the run's report.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// A remote call failed where no per-file fallback exists.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The checkpoint could not be written.
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Filesystem error outside a single file's upload.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A report could not be serialized or parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or missing configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// What is wrong.
        message: String,
    },

    /// A blocking or spawned task panicked.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
