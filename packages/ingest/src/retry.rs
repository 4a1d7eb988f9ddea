//! Per-file retry policy.
//!
//! Any failure in presign, store upload, or registration ends the current
//! attempt only. The file is tried again after a linear backoff until the
//! attempt budget is spent:
//!
//! | Attempt failed | Wait before next (default 2 s base) |
//! |---|---|
//! | 1 | 2 s |
//! | 2 | 4 s |
//! | 3 (last, default budget) | none, file marked failed |
//!
//! Client errors (4xx) go through the same budget as transient ones.

use std::time::Duration;

use kb_ingest_models::UploadConfig;

/// Attempt budget and backoff for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    /// Delay multiplied by the number of the attempt that just failed.
    pub base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: config.retry_delay(),
        }
    }

    /// Wait after attempt `attempt` (1-based) fails, or `None` when that
    /// was the last attempt.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| self.base_delay * attempt)
    }
}
