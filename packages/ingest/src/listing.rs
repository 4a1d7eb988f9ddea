//! Paging through a collection's file listing.
//!
//! Shared by the duplicate-name pre-pass, reconciliation, and the status
//! scan. A failed page never fails the caller: paging stops and the result
//! records why, so callers can mark their output as partial.

use kb_ingest_models::progress::ProgressCallback;
use kb_ingest_remote::KnowledgeBaseApi;
use kb_ingest_remote_models::RemoteFile;

/// Files gathered from the listing.
#[derive(Debug, Clone, Default)]
pub struct RemoteListing {
    /// Entries that carried an id, in listing order.
    pub files: Vec<RemoteFile>,
    /// `true` once a page without a next link was reached.
    pub exhausted: bool,
    /// Error that stopped paging early, if any.
    pub error: Option<String>,
    /// Total reported by the first page.
    pub total_count: Option<u64>,
    pub pages_fetched: u32,
    /// Derived from the first page's total and size.
    pub estimated_pages: Option<u64>,
}

impl RemoteListing {
    /// Whether every page was fetched.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.exhausted && self.error.is_none()
    }
}

/// Fetches pages until the listing is exhausted, `max_pages` is reached, or
/// a page fails.
pub async fn collect_remote_files(
    api: &dyn KnowledgeBaseApi,
    collection_id: &str,
    page_size: u32,
    max_pages: Option<u32>,
    progress: &dyn ProgressCallback,
) -> RemoteListing {
    let mut listing = RemoteListing::default();
    let mut page = 1u32;

    loop {
        if max_pages.is_some_and(|max| listing.pages_fetched >= max) {
            log::info!("Stopping listing after {} page(s)", listing.pages_fetched);
            break;
        }

        let result = match api.list_page(collection_id, page, page_size).await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Listing page {page} failed, continuing with partial results: {e}");
                listing.error = Some(e.to_string());
                break;
            }
        };

        if page == 1 {
            listing.total_count = result.count;
            listing.estimated_pages = result.estimated_pages();
            let bar_total = match (listing.estimated_pages, max_pages) {
                (Some(estimate), Some(max)) => estimate.min(u64::from(max)),
                (Some(estimate), None) => estimate,
                (None, _) => 1,
            };
            progress.set_total(bar_total);
            log::info!(
                "Collection reports {} file(s), about {} page(s)",
                result
                    .count
                    .map_or_else(|| "an unknown number of".to_string(), |c| c.to_string()),
                listing
                    .estimated_pages
                    .map_or_else(|| "?".to_string(), |p| p.to_string()),
            );
        }

        listing.pages_fetched += 1;
        progress.inc(1);

        let has_next = result.has_next();
        let empty = result.results.is_empty();
        for file in result.results {
            if file.id.is_some() {
                listing.files.push(file);
            } else {
                log::debug!("Ignoring listed file without id: {}", file.filename);
            }
        }
        progress.set_message(format!("{} file(s) listed", listing.files.len()));

        if !has_next || empty {
            listing.exhausted = true;
            break;
        }
        page += 1;
    }

    listing
}
