#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Wire types for the knowledge base API.
//!
//! Covers the presigned-upload handshake, file registration, the paginated
//! file listing, and the processing status reported for each listed file.
//! Identifiers are normalized to strings on the way in because the API
//! returns UUID strings in some deployments and integers in others.

use std::collections::BTreeMap;

use chrono::DateTime;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Model name the presign endpoint expects for knowledge base files.
pub const KNOWLEDGE_FILE_MODEL: &str = "chatbot-file";

/// Form field name the raw file bytes are sent under.
pub const FILE_FIELD: &str = "file";

/// Request body for `POST upload-presigned-url/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest {
    /// Original file name (basename only).
    pub filename: String,
    /// Target model on the API side.
    pub model_name: String,
    /// Form field the file will be posted under.
    pub field_name: String,
    /// File size in bytes.
    pub file_size: u64,
}

impl PresignRequest {
    /// Builds a presign request for a knowledge base file.
    #[must_use]
    pub fn for_file(filename: &str, file_size: u64) -> Self {
        Self {
            filename: filename.to_string(),
            model_name: KNOWLEDGE_FILE_MODEL.to_string(),
            field_name: FILE_FIELD.to_string(),
            file_size,
        }
    }
}

/// One-time upload descriptor returned by the presign endpoint.
///
/// `fields` must be posted verbatim, before the file part, to `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDescriptor {
    /// Object store endpoint that receives the multipart POST.
    pub url: String,
    /// Signed form fields, including the object `key`.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl UploadDescriptor {
    /// Object store key the file will be stored under, if the descriptor
    /// carries one.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.fields.get("key").map(String::as_str)
    }
}

/// A single entry of a registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterFile {
    /// Object store key returned by the upload step.
    pub file: String,
    /// Display name for the registered file.
    pub filename: String,
}

/// Request body for `POST knowledge-bases/{id}/files/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterRequest {
    /// Files to register.
    pub files: Vec<RegisterFile>,
}

impl RegisterRequest {
    /// Registration request for exactly one uploaded object.
    #[must_use]
    pub fn single(key: &str, filename: &str) -> Self {
        Self {
            files: vec![RegisterFile {
                file: key.to_string(),
                filename: filename.to_string(),
            }],
        }
    }
}

/// A record created by a registration call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredFile {
    /// Catalog identifier of the new knowledge file. Some deployments omit it.
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    /// Registered file name, when echoed back.
    #[serde(default)]
    pub filename: Option<String>,
}

/// Registration responses come back in more than one shape. A bare list is
/// the normal case; a paginated wrapper and a single object are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RegistrationResponse {
    /// `[{"id": ...}, ...]`
    List(Vec<RegisteredFile>),
    /// `{"results": [{"id": ...}]}`
    Wrapped {
        /// Created records.
        results: Vec<RegisteredFile>,
    },
    /// `{"id": ...}`
    Single(RegisteredFile),
}

impl RegistrationResponse {
    /// Flattens the response into its created records.
    #[must_use]
    pub fn into_records(self) -> Vec<RegisteredFile> {
        match self {
            Self::List(records) | Self::Wrapped { results: records } => records,
            Self::Single(record) => vec![record],
        }
    }
}

/// A file as reported by the paginated listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Catalog identifier. Entries without one are ignored by callers.
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    /// File name as registered.
    #[serde(default)]
    pub filename: String,
    /// Raw processing status string.
    #[serde(default)]
    pub status: Option<String>,
    /// Creation time. Usually epoch milliseconds, occasionally an ISO string.
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<Value>,
}

impl RemoteFile {
    /// Processing status bucket for this file.
    #[must_use]
    pub fn status_bucket(&self) -> RemoteStatus {
        RemoteStatus::classify(self.status.as_deref())
    }

    /// Creation time rendered for reports.
    ///
    /// Epoch-millisecond values become RFC 3339 timestamps; any other value
    /// is passed through as-is and a missing value becomes an empty string.
    #[must_use]
    pub fn created_at_display(&self) -> String {
        match &self.created_at {
            None | Some(Value::Null) => String::new(),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .map_or_else(|| n.to_string(), |dt| dt.to_rfc3339()),
            Some(Value::String(s)) => s
                .parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_millis)
                .map_or_else(|| s.clone(), |dt| dt.to_rfc3339()),
            Some(other) => other.to_string(),
        }
    }
}

/// One page of `GET knowledge-bases/{id}/files/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
    /// Total number of files in the collection, if reported.
    #[serde(default)]
    pub count: Option<u64>,
    /// URL of the next page. Absent or null once the listing is exhausted.
    #[serde(default)]
    pub next: Option<String>,
    /// Files on this page.
    #[serde(default)]
    pub results: Vec<RemoteFile>,
}

impl ListPage {
    /// Whether another page follows this one.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.next.as_deref().is_some_and(|n| !n.is_empty())
    }

    /// Estimated number of pages, derived from `count` and this page's size.
    ///
    /// Only meaningful for the first page. Returns `None` when the total is
    /// not reported or the page is empty.
    #[must_use]
    pub fn estimated_pages(&self) -> Option<u64> {
        let per_page = self.results.len() as u64;
        match self.count {
            Some(count) if per_page > 0 => Some(count.div_ceil(per_page)),
            _ => None,
        }
    }
}

/// Processing status buckets reported by the catalog.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    /// Registered, processing not yet started.
    Initial,
    /// Being parsed or indexed.
    Processing,
    /// Fully processed.
    Done,
    /// Processing failed on the remote side.
    Failed,
    /// Any status string not listed above.
    Other,
}

impl RemoteStatus {
    /// Classifies a raw status string. Unknown or missing values land in
    /// [`RemoteStatus::Other`].
    #[must_use]
    pub fn classify(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.trim().parse().ok())
            .unwrap_or(Self::Other)
    }

    /// Statuses an operator usually needs to look at.
    #[must_use]
    pub const fn needs_attention(self) -> bool {
        matches!(self, Self::Initial | Self::Processing | Self::Failed)
    }
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!(
            "expected string or integer id, got {other}"
        ))),
    }
}
