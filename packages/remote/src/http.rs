//! `reqwest` implementation of [`KnowledgeBaseApi`].

use std::path::Path;

use kb_ingest_remote_models::{ListPage, RegisteredFile, UploadDescriptor};

use crate::{KnowledgeBaseApi, RemoteConfig, RemoteError, catalog, presign, register, store};

/// Knowledge base client over HTTP.
///
/// One `reqwest::Client` is shared by all calls so connections are pooled
/// across concurrent uploads.
#[derive(Debug, Clone)]
pub struct HttpKnowledgeBase {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl HttpKnowledgeBase {
    /// Builds a client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Http`] if the TLS backend cannot be
    /// initialized.
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("kb_ingest/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Connection settings in use.
    #[must_use]
    pub const fn config(&self) -> &RemoteConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl KnowledgeBaseApi for HttpKnowledgeBase {
    async fn presign(
        &self,
        filename: &str,
        file_size: u64,
    ) -> Result<UploadDescriptor, RemoteError> {
        presign::request_descriptor(&self.client, &self.config, filename, file_size).await
    }

    async fn upload_to_store(
        &self,
        descriptor: &UploadDescriptor,
        path: &Path,
        filename: &str,
        file_size: u64,
    ) -> Result<String, RemoteError> {
        store::upload_file(&self.client, descriptor, path, filename, file_size).await
    }

    async fn register(
        &self,
        collection_id: &str,
        key: &str,
        filename: &str,
    ) -> Result<Vec<RegisteredFile>, RemoteError> {
        register::register_object(&self.client, &self.config, collection_id, key, filename).await
    }

    async fn list_page(
        &self,
        collection_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ListPage, RemoteError> {
        catalog::fetch_page(&self.client, &self.config, collection_id, page, page_size).await
    }

    async fn delete_file(&self, collection_id: &str, file_id: &str) -> Result<(), RemoteError> {
        catalog::delete(&self.client, &self.config, collection_id, file_id).await
    }
}
