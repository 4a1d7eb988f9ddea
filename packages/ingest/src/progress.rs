//! Aggregated upload progress.
//!
//! [`ProgressTracker`] is shared by every upload task. It counts terminal
//! outcomes, derives a rate and ETA, and forwards a one-line summary to the
//! [`ProgressCallback`], which renders it without interleaving with log
//! output.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use kb_ingest_models::UploadStatus;
use kb_ingest_models::progress::ProgressCallback;

/// Thread-safe counters for one run.
pub struct ProgressTracker {
    total: u64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    started: Instant,
    callback: Arc<dyn ProgressCallback>,
}

/// Point-in-time view of a [`ProgressTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Files finished per second.
    pub rate: f64,
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    #[must_use]
    pub const fn done(&self) -> u64 {
        self.succeeded + self.failed + self.skipped
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ok {} | failed {} | skipped {} | {:.1} files/s",
            self.succeeded, self.failed, self.skipped, self.rate
        )?;
        if let Some(eta) = self.eta {
            let secs = eta.as_secs();
            write!(
                f,
                " | ETA {:02}:{:02}:{:02}",
                secs / 3600,
                (secs % 3600) / 60,
                secs % 60
            )?;
        }
        Ok(())
    }
}

impl ProgressTracker {
    /// Starts tracking `total` files.
    #[must_use]
    pub fn new(total: u64, callback: Arc<dyn ProgressCallback>) -> Self {
        callback.set_total(total);
        Self {
            total,
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            started: Instant::now(),
            callback,
        }
    }

    /// Counts one file reaching `status`. Non-terminal statuses still
    /// advance the bar; they mean the file was left unresolved.
    pub fn record(&self, status: UploadStatus) {
        match status {
            UploadStatus::Success => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            UploadStatus::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            UploadStatus::Skipped => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            UploadStatus::Pending | UploadStatus::Uploading => {}
        }
        self.callback.inc(1);
        self.callback.set_message(self.snapshot().to_string());
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let skipped = self.skipped.load(Ordering::Relaxed);
        let done = succeeded + failed + skipped;
        let (rate, eta) = rate_and_eta(done, self.total, self.started.elapsed());
        ProgressSnapshot {
            total: self.total,
            succeeded,
            failed,
            skipped,
            rate,
            eta,
        }
    }

    /// Final message on the progress bar.
    pub fn finish(&self) {
        self.callback.finish(self.snapshot().to_string());
    }
}

#[allow(clippy::cast_precision_loss)]
fn rate_and_eta(done: u64, total: u64, elapsed: Duration) -> (f64, Option<Duration>) {
    let secs = elapsed.as_secs_f64();
    if done == 0 || secs <= 0.0 {
        return (0.0, None);
    }
    let rate = done as f64 / secs;
    let remaining = total.saturating_sub(done);
    (rate, Some(Duration::from_secs_f64(remaining as f64 / rate)))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        total: Mutex<u64>,
        position: Mutex<u64>,
        last_message: Mutex<String>,
    }

    impl ProgressCallback for Recorder {
        fn set_total(&self, total: u64) {
            *self.total.lock().unwrap() = total;
        }
        fn set_position(&self, pos: u64) {
            *self.position.lock().unwrap() = pos;
        }
        fn inc(&self, delta: u64) {
            *self.position.lock().unwrap() += delta;
        }
        fn set_message(&self, msg: String) {
            *self.last_message.lock().unwrap() = msg;
        }
        fn finish(&self, msg: String) {
            *self.last_message.lock().unwrap() = msg;
        }
        fn finish_and_clear(&self) {}
    }

    #[test]
    fn counts_outcomes_and_reports_to_callback() {
        let recorder = Arc::new(Recorder::default());
        let tracker = ProgressTracker::new(4, recorder.clone());

        tracker.record(UploadStatus::Success);
        tracker.record(UploadStatus::Failed);
        tracker.record(UploadStatus::Skipped);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.done(), 3);
        assert_eq!(*recorder.total.lock().unwrap(), 4);
        assert_eq!(*recorder.position.lock().unwrap(), 3);
        assert!(
            recorder
                .last_message
                .lock()
                .unwrap()
                .starts_with("ok 1 | failed 1 | skipped 1")
        );
    }

    #[test]
    fn eta_from_rate() {
        let (rate, eta) = rate_and_eta(10, 30, Duration::from_secs(5));
        assert!((rate - 2.0).abs() < f64::EPSILON);
        assert_eq!(eta, Some(Duration::from_secs(10)));

        assert_eq!(rate_and_eta(0, 30, Duration::from_secs(5)), (0.0, None));
    }

    #[test]
    fn eta_renders_as_clock() {
        let snapshot = ProgressSnapshot {
            total: 10,
            succeeded: 5,
            failed: 0,
            skipped: 0,
            rate: 0.5,
            eta: Some(Duration::from_secs(3725)),
        };
        assert!(snapshot.to_string().ends_with("ETA 01:02:05"));
    }
}
