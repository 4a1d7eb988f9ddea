//! Presigned upload descriptors.

use kb_ingest_remote_models::{PresignRequest, UploadDescriptor};

use crate::{RemoteConfig, RemoteError, ensure_success, read_json};

/// Path of the presign endpoint under the API root.
pub const PRESIGN_PATH: &str = "upload-presigned-url/";

/// Asks the API for a one-time upload descriptor for `filename`.
///
/// # Errors
///
/// Returns [`RemoteError`] on transport failure, a non-2xx status, or a
/// body that is not a descriptor.
pub async fn request_descriptor(
    client: &reqwest::Client,
    config: &RemoteConfig,
    filename: &str,
    file_size: u64,
) -> Result<UploadDescriptor, RemoteError> {
    let response = client
        .post(config.endpoint(PRESIGN_PATH))
        .header(reqwest::header::AUTHORIZATION, config.auth_header())
        .json(&PresignRequest::for_file(filename, file_size))
        .send()
        .await?;

    let descriptor: UploadDescriptor = read_json(ensure_success(response).await?).await?;
    log::debug!(
        "Presigned {filename} ({file_size} bytes) -> {}",
        descriptor.key().unwrap_or("<no key>")
    );
    Ok(descriptor)
}
