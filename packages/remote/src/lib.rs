#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Client for the knowledge base API and its presigned object store.
//!
//! Every remote call the ingest pipeline makes goes through the
//! [`KnowledgeBaseApi`] trait. [`HttpKnowledgeBase`] is the `reqwest`
//! implementation; tests substitute an in-memory fake.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `KB_API_KEY` | Yes | API key sent as `Authorization: Api-Key <key>` |
//! | `KB_BASE_URL` | No | API root, defaults to [`DEFAULT_BASE_URL`] |

pub mod catalog;
pub mod http;
pub mod presign;
pub mod register;
pub mod store;

use std::path::Path;
use std::time::Duration;

pub use http::HttpKnowledgeBase;
use kb_ingest_remote_models::{ListPage, RegisteredFile, UploadDescriptor};

/// API root used when `KB_BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "https://api.maiagent.ai/api/v1/";

/// Per-request timeout used when none is configured. Uploads of large
/// files need minutes, not seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum length of the response body kept in [`RemoteError::Status`].
const BODY_PREVIEW_LEN: usize = 500;

/// Errors returned by remote calls.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Transport failure (connect, timeout, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an unexpected status code.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Leading part of the response body.
        body: String,
    },

    /// Response body was not the expected JSON shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading the local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: String,
    },

    /// Response parsed but lacked something the protocol needs.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// What was wrong with it.
        message: String,
    },
}

impl RemoteError {
    /// HTTP status code for [`RemoteError::Status`] errors.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Connection settings for the knowledge base API.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// API key.
    pub api_key: String,
    /// API root, always ending in `/`.
    pub base_url: String,
    /// Timeout applied to every request.
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Creates a config, normalizing `base_url` to end with a slash.
    #[must_use]
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            api_key: api_key.into(),
            base_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Reads `KB_API_KEY` and `KB_BASE_URL` from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::MissingEnv`] if `KB_API_KEY` is not set.
    pub fn from_env() -> Result<Self, RemoteError> {
        let api_key = require_env("KB_API_KEY")?;
        let base_url =
            std::env::var("KB_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(api_key, base_url))
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Absolute URL for an API path relative to the root.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Value of the `Authorization` header.
    #[must_use]
    pub fn auth_header(&self) -> String {
        format!("Api-Key {}", self.api_key)
    }
}

/// The remote operations the ingest pipeline depends on.
///
/// Implementations must be safe to call from many tasks at once; the
/// pipeline bounds concurrency itself.
#[async_trait::async_trait]
pub trait KnowledgeBaseApi: Send + Sync {
    /// Requests a one-time upload descriptor for a file.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] on transport failure, a non-2xx status, or an
    /// unparseable descriptor.
    async fn presign(&self, filename: &str, file_size: u64)
    -> Result<UploadDescriptor, RemoteError>;

    /// Streams the file at `path` to the object store named by
    /// `descriptor` and returns the stored object key.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] if the file cannot be read, the descriptor
    /// has no key, or the store answers with anything but 204.
    async fn upload_to_store(
        &self,
        descriptor: &UploadDescriptor,
        path: &Path,
        filename: &str,
        file_size: u64,
    ) -> Result<String, RemoteError>;

    /// Registers an uploaded object with a collection.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] on transport failure, a non-2xx status, or an
    /// unrecognized response shape. A response without ids is not an error.
    async fn register(
        &self,
        collection_id: &str,
        key: &str,
        filename: &str,
    ) -> Result<Vec<RegisteredFile>, RemoteError>;

    /// Fetches one page of the collection's file listing. Pages start at 1.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] on transport failure, a non-2xx status, or an
    /// unparseable page.
    async fn list_page(
        &self,
        collection_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ListPage, RemoteError>;

    /// Deletes a file from the collection.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Status`] for any non-2xx answer so callers can
    /// classify it, or [`RemoteError::Http`] on transport failure.
    async fn delete_file(&self, collection_id: &str, file_id: &str) -> Result<(), RemoteError>;
}

/// Passes successful responses through and turns anything else into
/// [`RemoteError::Status`] carrying a body preview.
///
/// # Errors
///
/// Returns [`RemoteError::Status`] for non-2xx responses.
pub async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body: body_preview(&body),
    })
}

/// Reads a response body and parses it as `T`.
///
/// # Errors
///
/// Returns [`RemoteError::Http`] if the body cannot be read, or
/// [`RemoteError::Json`] if it does not parse.
pub async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, RemoteError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        log::debug!("Unparseable response body: {}", body_preview(&text));
        RemoteError::Json(e)
    })
}

fn body_preview(body: &str) -> String {
    if body.chars().count() > BODY_PREVIEW_LEN {
        let head: String = body.chars().take(BODY_PREVIEW_LEN).collect();
        format!("{head}...")
    } else {
        body.to_string()
    }
}

fn require_env(name: &str) -> Result<String, RemoteError> {
    std::env::var(name).map_err(|_| RemoteError::MissingEnv {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let config = RemoteConfig::new("k", "https://example.test/api/v1");
        assert_eq!(config.base_url, "https://example.test/api/v1/");
        assert_eq!(
            config.endpoint("/upload-presigned-url/"),
            "https://example.test/api/v1/upload-presigned-url/"
        );
        assert_eq!(config.auth_header(), "Api-Key k");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn body_preview_truncates_on_char_boundary() {
        let long = "é".repeat(BODY_PREVIEW_LEN + 10);
        let preview = body_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), BODY_PREVIEW_LEN + 3);
        assert_eq!(body_preview("short"), "short");
    }

    #[test]
    fn status_accessor() {
        let err = RemoteError::Status {
            status: 409,
            body: String::new(),
        };
        assert_eq!(err.status(), Some(409));
        let err = RemoteError::InvalidResponse {
            message: "x".to_string(),
        };
        assert_eq!(err.status(), None);
    }
}
