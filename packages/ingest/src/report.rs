//! Reading and writing JSON reports.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::IngestError;

/// Report file name prefixes.
pub const UPLOAD_REPORT: &str = "upload_report";
pub const INTEGRITY_REPORT: &str = "integrity_check";
pub const STATUS_REPORT: &str = "status_scan";
pub const DELETION_LOG: &str = "duplicate_deletion_log";
pub const REUPLOAD_LOG: &str = "missing_files_upload";
pub const FIX_FAILED_LOG: &str = "fix_failed_files_log";

/// Local time formatted for report file names, e.g. `20250131_142501`.
#[must_use]
pub fn file_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Local time for timestamp fields inside reports.
#[must_use]
pub fn now_rfc3339() -> String {
    chrono::Local::now().to_rfc3339()
}

/// Writes `value` as pretty-printed JSON, creating parent directories.
///
/// # Errors
///
/// Returns [`IngestError`] if serialization or the write fails.
pub async fn write_json<T: Serialize + Sync>(path: &Path, value: &T) -> Result<(), IngestError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, json).await?;
    log::info!("Report saved to {}", path.display());
    Ok(())
}

/// Reads a report written by [`write_json`].
///
/// # Errors
///
/// Returns [`IngestError::Io`] if the file cannot be read or
/// [`IngestError::Json`] if it is not the expected report.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, IngestError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
