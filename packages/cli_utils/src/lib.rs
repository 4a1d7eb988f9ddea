#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal helpers for the `kb_ingest` binary.
//!
//! Provides `indicatif`-backed progress bars behind the [`ProgressCallback`]
//! trait, a `dialoguer` implementation of [`Confirm`], and [`init_logger`]
//! which sets up `indicatif-log-bridge` so that `log::info!` and friends are
//! suspended while progress bars redraw. [`log_to_file`] additionally copies
//! log lines into a per-run log file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use kb_ingest_models::confirm::Confirm;
use kb_ingest_models::progress::ProgressCallback;

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style to switch to once `set_total()` provides a known length.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Bar for an upload run. Spins while the source directory is scanned
    /// and becomes a file bar once the engine knows how many files remain;
    /// the message slot then carries counts, rate, and ETA.
    #[must_use]
    pub fn upload_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {prefix} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "{prefix} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}] {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }

    /// Bar for paging through a collection listing. Starts as a spinner and
    /// becomes a page bar once the first page reports the total.
    #[must_use]
    pub fn pages_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "  {prefix} {wide_bar:.cyan/dim} page {pos}/{len} [{eta}] {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn set_position(&self, pos: u64) {
        self.bar.set_position(pos);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Yes/no prompt on the terminal. Progress bars are hidden while it waits.
///
/// Defaults to "no"; a prompt that cannot be shown (no TTY) also counts as
/// "no".
pub struct DialoguerConfirm {
    multi: MultiProgress,
}

impl DialoguerConfirm {
    #[must_use]
    pub const fn new(multi: MultiProgress) -> Self {
        Self { multi }
    }
}

impl Confirm for DialoguerConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        self.multi.suspend(|| {
            dialoguer::Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
                .unwrap_or_else(|e| {
                    log::warn!("Confirmation prompt failed: {e}");
                    false
                })
        })
    }
}

/// Log file that receives a copy of every line the terminal logger prints.
static LOG_FILE: Mutex<Option<File>> = Mutex::new(None);

/// Terminal logger that also writes to [`LOG_FILE`] when one is open.
struct TeeLogger<L> {
    console: L,
}

impl<L: log::Log> log::Log for TeeLogger<L> {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        self.console.enabled(metadata)
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.console.log(record);

        let mut file = LOG_FILE.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = file.as_mut() {
            writeln!(file, "{}", format_line(record)).ok();
        }
    }

    fn flush(&self) {
        self.console.flush();
        let mut file = LOG_FILE.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = file.as_mut() {
            file.flush().ok();
        }
    }
}

fn format_line(record: &log::Record<'_>) -> String {
    format!(
        "{} {:<5} {} > {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        record.level(),
        record.target(),
        record.args()
    )
}

/// Appends every subsequent log line to `path` as well as the terminal,
/// replacing any log file opened earlier.
///
/// # Errors
///
/// Returns the I/O error if `path` cannot be opened for appending.
pub fn log_to_file(path: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    *LOG_FILE.lock().unwrap_or_else(PoisonError::into_inner) = Some(file);
    Ok(())
}

/// Stops copying log lines into the file opened by [`log_to_file`].
pub fn close_log_file() {
    if let Some(mut file) = LOG_FILE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
    {
        file.flush().ok();
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// The level comes from `RUST_LOG` and defaults to `info`.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), TeeLogger { console: logger })
        .try_init()
        .ok(); // already set, e.g. in tests

    log::set_max_level(level);

    multi
}
