//! In-memory knowledge base and scratch-directory helpers for tests.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use kb_ingest_remote::{KnowledgeBaseApi, RemoteError};
use kb_ingest_remote_models::{ListPage, RegisteredFile, RemoteFile, UploadDescriptor};

#[derive(Default)]
struct FakeState {
    presign_failures: HashMap<String, u32>,
    presign_calls: Vec<String>,
    remote: Vec<RemoteFile>,
    next_id: u64,
    omit_ids: bool,
    fail_listing_from: Option<u32>,
    delete_statuses: HashMap<String, u16>,
    delete_calls: Vec<String>,
}

/// Fake [`KnowledgeBaseApi`] with failure injection and a concurrency
/// high-water mark.
#[derive(Default)]
pub struct FakeKnowledgeBase {
    state: Mutex<FakeState>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeKnowledgeBase {
    /// Every call sleeps for `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// The next `times` presign calls for `filename` fail with HTTP 503.
    pub fn fail_presign(&self, filename: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .presign_failures
            .insert(filename.to_string(), times);
    }

    /// Registration responses carry no ids.
    pub fn omit_ids(&self) {
        self.state.lock().unwrap().omit_ids = true;
    }

    /// Listing pages at or after `page` fail with HTTP 502.
    pub fn fail_listing_from_page(&self, page: u32) {
        self.state.lock().unwrap().fail_listing_from = Some(page);
    }

    /// Deleting `id` answers `status` instead of 204.
    pub fn delete_status(&self, id: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .delete_statuses
            .insert(id.to_string(), status);
    }

    /// Adds `(id, filename, status)` entries to the collection.
    pub fn seed_remote<'a>(&self, files: impl IntoIterator<Item = (String, String, &'a str)>) {
        let mut state = self.state.lock().unwrap();
        for (id, filename, status) in files {
            state.remote.push(RemoteFile {
                id: Some(id),
                filename,
                status: Some(status.to_string()),
                created_at: Some(serde_json::json!(1_700_000_000_000_i64)),
            });
        }
    }

    pub fn presign_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().presign_calls.clone()
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().delete_calls.clone()
    }

    pub fn remote_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .remote
            .iter()
            .filter_map(|f| f.id.clone())
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn status_error(status: u16) -> RemoteError {
    RemoteError::Status {
        status,
        body: String::new(),
    }
}

#[async_trait::async_trait]
impl KnowledgeBaseApi for FakeKnowledgeBase {
    async fn presign(
        &self,
        filename: &str,
        _file_size: u64,
    ) -> Result<UploadDescriptor, RemoteError> {
        self.enter().await;
        let result = {
            let mut state = self.state.lock().unwrap();
            state.presign_calls.push(filename.to_string());
            match state.presign_failures.get_mut(filename) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    Err(status_error(503))
                }
                _ => Ok(UploadDescriptor {
                    url: "https://store.test/upload".to_string(),
                    fields: BTreeMap::from([
                        ("key".to_string(), format!("uploads/{filename}")),
                        ("policy".to_string(), "signed".to_string()),
                    ]),
                }),
            }
        };
        self.leave();
        result
    }

    async fn upload_to_store(
        &self,
        descriptor: &UploadDescriptor,
        path: &Path,
        _filename: &str,
        _file_size: u64,
    ) -> Result<String, RemoteError> {
        self.enter().await;
        let result = match tokio::fs::metadata(path).await {
            Ok(_) => descriptor
                .key()
                .map(str::to_string)
                .ok_or_else(|| RemoteError::InvalidResponse {
                    message: "no key".to_string(),
                }),
            Err(e) => Err(RemoteError::Io(e)),
        };
        self.leave();
        result
    }

    async fn register(
        &self,
        _collection_id: &str,
        _key: &str,
        filename: &str,
    ) -> Result<Vec<RegisteredFile>, RemoteError> {
        self.enter().await;
        let record = {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = format!("id-{}", state.next_id);
            state.remote.push(RemoteFile {
                id: Some(id.clone()),
                filename: filename.to_string(),
                status: Some("initial".to_string()),
                created_at: None,
            });
            RegisteredFile {
                id: (!state.omit_ids).then_some(id),
                filename: Some(filename.to_string()),
            }
        };
        self.leave();
        Ok(vec![record])
    }

    async fn list_page(
        &self,
        _collection_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<ListPage, RemoteError> {
        let state = self.state.lock().unwrap();
        if state.fail_listing_from.is_some_and(|from| page >= from) {
            return Err(status_error(502));
        }
        let size = page_size as usize;
        let start = (page.saturating_sub(1) as usize) * size;
        let end = (start + size).min(state.remote.len());
        let results = state.remote.get(start..end).unwrap_or_default().to_vec();
        Ok(ListPage {
            count: Some(state.remote.len() as u64),
            next: (end < state.remote.len()).then(|| format!("?page={}", page + 1)),
            results,
        })
    }

    async fn delete_file(&self, _collection_id: &str, file_id: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls.push(file_id.to_string());
        let status = state.delete_statuses.get(file_id).copied();
        match status {
            Some(409) => Err(status_error(409)),
            Some(500) => {
                state.remote.retain(|f| f.id.as_deref() != Some(file_id));
                Err(status_error(500))
            }
            Some(other) => Err(status_error(other)),
            None if state.remote.iter().any(|f| f.id.as_deref() == Some(file_id)) => {
                state.remote.retain(|f| f.id.as_deref() != Some(file_id));
                Ok(())
            }
            None => Err(status_error(404)),
        }
    }
}

/// Fresh, empty directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Writes `(relative path, contents)` pairs under `dir`.
pub fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (name, contents) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
}
