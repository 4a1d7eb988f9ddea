//! Registration of uploaded objects with a collection.

use kb_ingest_remote_models::{RegisterRequest, RegisteredFile, RegistrationResponse};

use crate::catalog::files_path;
use crate::{RemoteConfig, RemoteError, ensure_success, read_json};

/// Registers `key` as `filename` in the collection and returns the created
/// records. Records may lack an id; that is left to the caller.
///
/// # Errors
///
/// Returns [`RemoteError`] on transport failure, a non-2xx status, or a
/// response that is neither a list nor an object.
pub async fn register_object(
    client: &reqwest::Client,
    config: &RemoteConfig,
    collection_id: &str,
    key: &str,
    filename: &str,
) -> Result<Vec<RegisteredFile>, RemoteError> {
    let response = client
        .post(config.endpoint(&files_path(collection_id)))
        .header(reqwest::header::AUTHORIZATION, config.auth_header())
        .json(&RegisterRequest::single(key, filename))
        .send()
        .await?;

    let parsed: RegistrationResponse = read_json(ensure_success(response).await?).await?;
    let records = parsed.into_records();

    if records.iter().all(|r| r.id.is_none()) {
        log::debug!("Registration of {filename} returned no file id");
    }

    Ok(records)
}
