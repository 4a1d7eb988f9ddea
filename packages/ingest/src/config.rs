//! Upload configuration loading.
//!
//! Defaults come from [`UploadConfig::default`]. An optional TOML file
//! overrides any subset of keys:
//!
//! ```toml
//! max_concurrent_uploads = 5
//! retry_delay_secs = 1.5
//! output_root = "/var/lib/kb_ingest"
//! ```

use std::path::Path;

use kb_ingest_models::UploadConfig;

use crate::IngestError;

/// Loads the config file at `path`, or the defaults when `path` is `None`.
///
/// # Errors
///
/// Returns [`IngestError::Io`] if the file cannot be read, or
/// [`IngestError::Config`] if it does not parse or fails validation.
pub fn load_config(path: Option<&Path>) -> Result<UploadConfig, IngestError> {
    let config = match path {
        None => UploadConfig::default(),
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let config: UploadConfig = toml::from_str(&text).map_err(|e| IngestError::Config {
                message: format!("{}: {e}", path.display()),
            })?;
            log::info!("Loaded configuration from {}", path.display());
            config
        }
    };

    validate(&config)?;
    Ok(config)
}

/// Rejects settings the engine cannot run with.
///
/// # Errors
///
/// Returns [`IngestError::Config`] naming the first invalid setting.
pub fn validate(config: &UploadConfig) -> Result<(), IngestError> {
    let problem = if config.max_concurrent_uploads == 0 {
        Some("max_concurrent_uploads must be at least 1")
    } else if config.max_retries == 0 {
        Some("max_retries must be at least 1")
    } else if config.page_size == 0 {
        Some("page_size must be at least 1")
    } else if !config.retry_delay_secs.is_finite() || config.retry_delay_secs < 0.0 {
        Some("retry_delay_secs must be a non-negative number")
    } else if config.timeout_secs == 0 {
        Some("timeout_secs must be at least 1")
    } else {
        None
    };

    problem.map_or(Ok(()), |message| {
        Err(IngestError::Config {
            message: message.to_string(),
        })
    })
}
