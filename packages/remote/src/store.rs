//! Direct uploads to the object store behind a presigned descriptor.
//!
//! The store expects a multipart POST with every signed field first and the
//! file bytes last under [`FILE_FIELD`]. It answers 204 with an empty body on
//! success. The file is streamed from disk rather than read into memory.

use std::path::Path;

use kb_ingest_remote_models::{FILE_FIELD, UploadDescriptor};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use tokio_util::io::ReaderStream;

use crate::{RemoteError, ensure_success};

/// Uploads `path` to the store and returns the object key it was stored
/// under.
///
/// # Errors
///
/// Returns [`RemoteError::InvalidResponse`] if the descriptor has no `key`
/// field, [`RemoteError::Io`] if the file cannot be opened, or
/// [`RemoteError::Status`] if the store does not answer 204.
pub async fn upload_file(
    client: &reqwest::Client,
    descriptor: &UploadDescriptor,
    path: &Path,
    filename: &str,
    file_size: u64,
) -> Result<String, RemoteError> {
    let key = descriptor
        .key()
        .ok_or_else(|| RemoteError::InvalidResponse {
            message: "upload descriptor has no key field".to_string(),
        })?
        .to_string();

    let file = tokio::fs::File::open(path).await?;
    let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
    let part = Part::stream_with_length(body, file_size)
        .file_name(filename.to_string())
        .mime_str("application/octet-stream")?;

    let form = descriptor
        .fields
        .iter()
        .fold(Form::new(), |form, (name, value)| {
            form.text(name.clone(), value.clone())
        })
        .part(FILE_FIELD, part);

    let response = ensure_success(client.post(&descriptor.url).multipart(form).send().await?).await?;

    let status = response.status();
    if status != StatusCode::NO_CONTENT {
        let body = response.text().await.unwrap_or_default();
        return Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(key)
}
