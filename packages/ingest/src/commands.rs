//! Operator commands shared by the CLI subcommands and the interactive
//! menu.
//!
//! Each command draws its own progress bar in the session's
//! [`MultiProgress`] and prints a short summary when it is done.

use std::path::Path;
use std::sync::Arc;

use kb_ingest_cli_utils::{IndicatifProgress, MultiProgress, close_log_file, log_to_file};
use kb_ingest_models::UploadConfig;
use kb_ingest_models::confirm::Confirm;
use kb_ingest_remote::{HttpKnowledgeBase, KnowledgeBaseApi, RemoteConfig};
use tokio_util::sync::CancellationToken;

use crate::{IngestError, UploadEngine, reconcile, repair, report, status_scan};

/// Client, settings, and terminal for one collection.
pub struct Session {
    api: Arc<dyn KnowledgeBaseApi>,
    config: UploadConfig,
    collection_id: String,
    multi: MultiProgress,
}

impl Session {
    /// Connects to the knowledge base configured in the environment.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if `collection_id` is empty and
    /// [`IngestError::Remote`] if `KB_API_KEY` is unset or the HTTP client
    /// cannot be built.
    pub fn connect(
        config: UploadConfig,
        collection_id: String,
        multi: MultiProgress,
    ) -> Result<Self, IngestError> {
        if collection_id.trim().is_empty() {
            return Err(IngestError::Config {
                message: "collection id is required (--collection or KB_COLLECTION_ID)"
                    .to_string(),
            });
        }
        let remote = RemoteConfig::from_env()?.with_timeout(config.timeout());
        log::debug!("Using API at {}", remote.base_url);
        let api = Arc::new(HttpKnowledgeBase::new(remote)?);
        Ok(Self::with_api(api, config, collection_id, multi))
    }

    #[must_use]
    pub fn with_api(
        api: Arc<dyn KnowledgeBaseApi>,
        config: UploadConfig,
        collection_id: String,
        multi: MultiProgress,
    ) -> Self {
        Self {
            api,
            config,
            collection_id,
            multi,
        }
    }

    #[must_use]
    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    #[must_use]
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }

    fn engine(&self) -> UploadEngine {
        UploadEngine::new(
            self.api.clone(),
            self.config.clone(),
            self.collection_id.clone(),
        )
    }

    /// Uploads `source_dir`, stopping admission when `cancel` fires.
    ///
    /// The run's log lines are also written to
    /// `logs/upload_log_<timestamp>.log` in its output directory.
    ///
    /// # Errors
    ///
    /// See [`UploadEngine::run`].
    pub async fn upload(
        &self,
        source_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), IngestError> {
        let bar = IndicatifProgress::upload_bar(&self.multi, "Uploading");
        let engine = self.engine().with_progress(bar);

        let layout = engine.layout(source_dir);
        layout.ensure().await?;
        let log_path = layout.log_path(&report::file_timestamp());
        match log_to_file(&log_path) {
            Ok(()) => log::info!("Logging to {}", log_path.display()),
            Err(e) => log::warn!("Cannot open log file {}: {e}", log_path.display()),
        }

        let outcome = engine.run(source_dir, cancel).await;
        close_log_file();
        let outcome = outcome?;

        println!("{}", outcome.report.summary);
        for failed in &outcome.report.failed_files {
            println!("  failed: {} ({})", failed.file_path, failed.error);
        }
        if let Some(path) = &outcome.report_path {
            println!("Report: {}", path.display());
        }
        if outcome.cancelled {
            println!("Interrupted; run again to resume from the checkpoint.");
        }
        Ok(())
    }

    /// Diffs the checkpoint of `source_dir` against the collection.
    ///
    /// # Errors
    ///
    /// See [`reconcile::run`].
    pub async fn reconcile(&self, source_dir: &Path) -> Result<(), IngestError> {
        let bar = IndicatifProgress::pages_bar(&self.multi, "Listing collection");
        let result = reconcile::run(
            self.api.as_ref(),
            &self.config,
            &self.collection_id,
            source_dir,
            bar.as_ref(),
        )
        .await?;

        let Some((report, path)) = result else {
            println!("No checkpoint found for {}; nothing to compare.", source_dir.display());
            return Ok(());
        };
        let summary = &report.summary;
        println!(
            "{} remote file(s), {} ledger id(s): {} missing, {} extra",
            summary.total_remote_files, summary.total_ledger_ids, summary.missing, summary.extra
        );
        if !summary.remote_listing_complete {
            println!("Warning: the remote listing was incomplete.");
        }
        println!("Report: {}", path.display());
        Ok(())
    }

    /// Buckets the collection by processing status.
    ///
    /// # Errors
    ///
    /// See [`status_scan::run`].
    pub async fn scan_status(
        &self,
        source_dir: Option<&Path>,
        max_pages: Option<u32>,
    ) -> Result<(), IngestError> {
        let bar = IndicatifProgress::pages_bar(&self.multi, "Scanning status");
        let (report, path) = status_scan::run(
            self.api.as_ref(),
            &self.config,
            &self.collection_id,
            source_dir,
            max_pages,
            bar.as_ref(),
        )
        .await?;

        println!("{} file(s): {}", report.total_scanned, report.summary);
        for file in &report.failed_files {
            println!("  failed: {} ({})", file.filename, file.id);
        }
        if report.truncated {
            println!("Warning: the scan stopped early; counts are partial.");
        }
        println!("Report: {}", path.display());
        Ok(())
    }

    /// Deletes the extras listed in a reconciliation report.
    ///
    /// # Errors
    ///
    /// See [`repair::run_delete_extras`].
    pub async fn delete_extras(
        &self,
        report_path: &Path,
        confirm: &dyn Confirm,
    ) -> Result<(), IngestError> {
        let (outcome, path) = repair::run_delete_extras(
            self.api.as_ref(),
            &self.config,
            &self.collection_id,
            report_path,
            confirm,
        )
        .await?;

        if outcome.confirmed {
            println!("{outcome}");
            println!("Log: {}", path.display());
        } else {
            println!("Cancelled; nothing was deleted.");
        }
        Ok(())
    }

    /// Re-uploads the missing files listed in a reconciliation report.
    ///
    /// # Errors
    ///
    /// See [`repair::run_upload_missing`].
    pub async fn upload_missing(
        &self,
        report_path: &Path,
        files_dir: Option<&Path>,
        source_dir: Option<&Path>,
        confirm: &dyn Confirm,
    ) -> Result<(), IngestError> {
        let (outcome, path) = repair::run_upload_missing(
            &self.engine(),
            report_path,
            files_dir,
            source_dir,
            confirm,
        )
        .await?;

        if outcome.confirmed {
            println!("{outcome}");
            println!("Log: {}", path.display());
        } else {
            println!("Cancelled; nothing was uploaded.");
        }
        Ok(())
    }

    /// Replaces the remotely failed files listed in a status scan report.
    ///
    /// # Errors
    ///
    /// See [`repair::run_fix_failed`].
    pub async fn fix_failed(
        &self,
        report_path: &Path,
        files_dir: &Path,
        confirm: &dyn Confirm,
    ) -> Result<(), IngestError> {
        let (outcome, path) =
            repair::run_fix_failed(&self.engine(), report_path, files_dir, confirm).await?;

        if outcome.deletion.confirmed {
            println!("Delete: {}", outcome.deletion);
            println!("Upload: {}", outcome.reupload);
            println!("Log: {}", path.display());
        } else {
            println!("Cancelled; nothing was changed.");
        }
        Ok(())
    }
}

/// Token cancelled on the first Ctrl-C.
///
/// Uploads already in flight finish; nothing new starts.
#[must_use]
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received; finishing in-flight uploads");
            trigger.cancel();
        }
    });
    token
}
