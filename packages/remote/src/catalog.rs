//! Listing and deleting files in a collection.

use kb_ingest_remote_models::ListPage;

use crate::{RemoteConfig, RemoteError, ensure_success, read_json};

/// Path of a collection's file list under the API root.
#[must_use]
pub fn files_path(collection_id: &str) -> String {
    format!("knowledge-bases/{collection_id}/files/")
}

/// Path of a single file in a collection.
#[must_use]
pub fn file_path(collection_id: &str, file_id: &str) -> String {
    format!("knowledge-bases/{collection_id}/files/{file_id}/")
}

/// Fetches one page of the collection's files.
///
/// # Errors
///
/// Returns [`RemoteError`] on transport failure, a non-2xx status, or an
/// unparseable page.
pub async fn fetch_page(
    client: &reqwest::Client,
    config: &RemoteConfig,
    collection_id: &str,
    page: u32,
    page_size: u32,
) -> Result<ListPage, RemoteError> {
    let response = client
        .get(config.endpoint(&files_path(collection_id)))
        .header(reqwest::header::AUTHORIZATION, config.auth_header())
        .query(&[("page", page), ("page_size", page_size)])
        .send()
        .await?;

    read_json(ensure_success(response).await?).await
}

/// Deletes one file by id.
///
/// # Errors
///
/// Returns [`RemoteError::Status`] for any non-2xx status.
pub async fn delete(
    client: &reqwest::Client,
    config: &RemoteConfig,
    collection_id: &str,
    file_id: &str,
) -> Result<(), RemoteError> {
    let response = client
        .delete(config.endpoint(&file_path(collection_id, file_id)))
        .header(reqwest::header::AUTHORIZATION, config.auth_header())
        .send()
        .await?;

    ensure_success(response).await?;
    Ok(())
}
