#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for knowledge base bulk uploads.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kb_ingest::commands::{Session, cancel_on_ctrl_c};
use kb_ingest::config::load_config;
use kb_ingest_cli_utils::DialoguerConfirm;
use kb_ingest_models::confirm::{AutoConfirm, Confirm};

#[derive(Parser)]
#[command(name = "kb_ingest", about = "Resumable bulk uploads into a knowledge base")]
struct Cli {
    /// Knowledge base id to work on
    #[arg(long, global = true, env = "KB_COLLECTION_ID")]
    collection: Option<String>,
    /// TOML file overriding the default upload settings
    #[arg(long, global = true, env = "KB_INGEST_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload every file under a directory, resuming from its checkpoint
    Upload {
        /// Directory to upload
        #[arg(long, env = "KB_SOURCE_DIR")]
        source: PathBuf,
        /// Maximum uploads in flight (overrides the config file)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Attempts per file (overrides the config file)
        #[arg(long)]
        max_retries: Option<u32>,
        /// Upload files even if a file with the same name is already in the
        /// knowledge base
        #[arg(long)]
        no_skip_existing: bool,
    },
    /// Compare a directory's checkpoint with the knowledge base and write an
    /// integrity report of missing and extra files
    Reconcile {
        /// Directory whose checkpoint to compare
        #[arg(long, env = "KB_SOURCE_DIR")]
        source: PathBuf,
    },
    /// Count files by processing status and list the ones needing attention
    ScanStatus {
        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<u32>,
        /// Save the report with this directory's outputs
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Delete the extra files listed in an integrity report
    DeleteExtras {
        /// Integrity report written by `reconcile`
        #[arg(long)]
        report: PathBuf,
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Upload again the missing files listed in an integrity report
    UploadMissing {
        /// Integrity report written by `reconcile`
        #[arg(long)]
        report: PathBuf,
        /// Where to look for files whose recorded path no longer exists
        #[arg(long)]
        files_dir: Option<PathBuf>,
        /// Record successes in this directory's checkpoint
        #[arg(long)]
        source: Option<PathBuf>,
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Delete files that failed remote processing and upload them again
    FixFailed {
        /// Status report written by `scan-status`
        #[arg(long)]
        report: PathBuf,
        /// Directory holding the original files, looked up by file name
        #[arg(long)]
        files_dir: PathBuf,
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}

fn confirmer(yes: bool, session: &Session) -> Box<dyn Confirm> {
    if yes {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(DialoguerConfirm::new(session.multi().clone()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = kb_ingest_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;

    let Some(command) = cli.command else {
        return kb_ingest::interactive::run(config, cli.collection, multi).await;
    };

    if let Commands::Upload {
        concurrency,
        max_retries,
        no_skip_existing,
        ..
    } = &command
    {
        if let Some(concurrency) = concurrency {
            config.max_concurrent_uploads = *concurrency;
        }
        if let Some(max_retries) = max_retries {
            config.max_retries = *max_retries;
        }
        if *no_skip_existing {
            config.skip_existing_remote = false;
        }
        kb_ingest::config::validate(&config)?;
    }

    let session = Session::connect(config, cli.collection.unwrap_or_default(), multi)?;

    match command {
        Commands::Upload { source, .. } => {
            let cancel = cancel_on_ctrl_c();
            session.upload(&source, &cancel).await?;
        }
        Commands::Reconcile { source } => {
            session.reconcile(&source).await?;
        }
        Commands::ScanStatus { max_pages, source } => {
            session.scan_status(source.as_deref(), max_pages).await?;
        }
        Commands::DeleteExtras { report, yes } => {
            let confirm = confirmer(yes, &session);
            session.delete_extras(&report, confirm.as_ref()).await?;
        }
        Commands::UploadMissing {
            report,
            files_dir,
            source,
            yes,
        } => {
            let confirm = confirmer(yes, &session);
            session
                .upload_missing(
                    &report,
                    files_dir.as_deref(),
                    source.as_deref(),
                    confirm.as_ref(),
                )
                .await?;
        }
        Commands::FixFailed {
            report,
            files_dir,
            yes,
        } => {
            let confirm = confirmer(yes, &session);
            session
                .fix_failed(&report, &files_dir, confirm.as_ref())
                .await?;
        }
    }

    Ok(())
}
