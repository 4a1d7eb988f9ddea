//! The durable upload ledger.
//!
//! A [`Checkpoint`] records which local paths were uploaded (and the catalog
//! id each received), which failed, and which were still queued when it was
//! written. On disk it is plain JSON:
//!
//! ```json
//! {
//!   "timestamp": "2025-01-01T12:00:00+00:00",
//!   "completed_files": ["/data/a.txt"],
//!   "failed_files": [["/data/b.txt", "HTTP 500: ..."]],
//!   "pending_files": [],
//!   "file_id_mapping": { "/data/a.txt": "6c1f..." }
//! }
//! ```
//!
//! Completed paths, ids, and failures are only ever merged, never replaced.
//! `pending_files` is a snapshot of the last run's unresolved queue and is
//! replaced wholesale at the end of each run. A path in `completed_files` is
//! never also in `failed_files` or `pending_files`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A `[path, error]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFile(pub String, pub String);

impl FailedFile {
    #[must_use]
    pub fn path(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn error(&self) -> &str {
        &self.1
    }
}

/// Ledger of completed, failed, and pending uploads for one source
/// directory and collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// When the checkpoint was last written.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Paths confirmed uploaded and registered.
    #[serde(default)]
    pub completed_files: BTreeSet<String>,
    /// Paths whose last attempt sequence failed, with the last error.
    #[serde(default)]
    pub failed_files: Vec<FailedFile>,
    /// Paths not yet resolved when the checkpoint was written.
    #[serde(default)]
    pub pending_files: Vec<String>,
    /// Catalog id for each completed path whose registration returned one.
    #[serde(default)]
    pub file_id_mapping: BTreeMap<String, String>,
}

impl Checkpoint {
    /// Whether `path` is recorded as uploaded.
    #[must_use]
    pub fn is_completed(&self, path: &str) -> bool {
        self.completed_files.contains(path)
    }

    /// Records a successful upload, clearing any earlier failure for the
    /// same path. Without a `remote_id` any id remembered for the path is
    /// dropped, since it belongs to an earlier upload.
    pub fn record_success(&mut self, path: &str, remote_id: Option<&str>) {
        self.completed_files.insert(path.to_string());
        if let Some(id) = remote_id {
            self.file_id_mapping.insert(path.to_string(), id.to_string());
        } else {
            self.file_id_mapping.remove(path);
        }
        self.failed_files.retain(|f| f.path() != path);
        self.pending_files.retain(|p| p != path);
    }

    /// Records a failure. The newest error for a path replaces older ones.
    /// Failures for already-completed paths are dropped.
    pub fn record_failure(&mut self, path: &str, error: &str) {
        if self.is_completed(path) {
            return;
        }
        self.pending_files.retain(|p| p != path);
        if let Some(existing) = self.failed_files.iter_mut().find(|f| f.path() == path) {
            existing.1 = error.to_string();
        } else {
            self.failed_files
                .push(FailedFile(path.to_string(), error.to_string()));
        }
    }

    /// Merges `newer` into `self`.
    ///
    /// Completed paths and id mappings are unioned, with `newer` winning
    /// on conflicting ids. Failures are keyed by path with `newer`'s error
    /// winning, and any failure whose path is completed on either side is
    /// dropped. Pending paths are unioned and then stripped of anything
    /// resolved.
    pub fn merge(&mut self, newer: &Self) {
        self.completed_files
            .extend(newer.completed_files.iter().cloned());
        self.file_id_mapping.extend(
            newer
                .file_id_mapping
                .iter()
                .map(|(path, id)| (path.clone(), id.clone())),
        );

        for failure in &newer.failed_files {
            if let Some(existing) = self
                .failed_files
                .iter_mut()
                .find(|f| f.path() == failure.path())
            {
                existing.1.clone_from(&failure.1);
            } else {
                self.failed_files.push(failure.clone());
            }
        }
        let completed = &self.completed_files;
        self.failed_files.retain(|f| !completed.contains(f.path()));

        for path in &newer.pending_files {
            if !self.pending_files.contains(path) {
                self.pending_files.push(path.clone());
            }
        }
        let failed: BTreeSet<&str> = self.failed_files.iter().map(FailedFile::path).collect();
        self.pending_files
            .retain(|p| !completed.contains(p) && !failed.contains(p.as_str()));

        if newer.timestamp > self.timestamp {
            self.timestamp.clone_from(&newer.timestamp);
        }
    }

    /// Replaces `pending_files` with `pending`, minus anything already
    /// completed or failed.
    pub fn replace_pending(&mut self, pending: &[String]) {
        let failed: BTreeSet<&str> = self.failed_files.iter().map(FailedFile::path).collect();
        self.pending_files = pending
            .iter()
            .filter(|p| !self.completed_files.contains(p.as_str()) && !failed.contains(p.as_str()))
            .cloned()
            .collect();
    }

    /// Catalog ids this ledger believes were uploaded.
    #[must_use]
    pub fn believed_uploaded_ids(&self) -> BTreeSet<String> {
        self.file_id_mapping.values().cloned().collect()
    }

    /// Reverse of `file_id_mapping`: catalog id to local path.
    #[must_use]
    pub fn paths_by_id(&self) -> BTreeMap<&str, &str> {
        self.file_id_mapping
            .iter()
            .map(|(path, id)| (id.as_str(), path.as_str()))
            .collect()
    }

    /// Stamps the checkpoint with the current local time.
    pub fn touch(&mut self) {
        self.timestamp = Some(chrono::Local::now().to_rfc3339());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_clears_earlier_failure() {
        let mut cp = Checkpoint::default();
        cp.record_failure("/a", "timeout");
        cp.record_success("/a", Some("1"));
        assert!(cp.is_completed("/a"));
        assert!(cp.failed_files.is_empty());
        assert_eq!(cp.file_id_mapping.get("/a").map(String::as_str), Some("1"));
    }

    #[test]
    fn newest_failure_wins() {
        let mut cp = Checkpoint::default();
        cp.record_failure("/a", "first");
        cp.record_failure("/a", "second");
        assert_eq!(cp.failed_files, vec![FailedFile("/a".into(), "second".into())]);
    }

    #[test]
    fn merge_accumulates_the_same_completed_set_in_any_order() {
        let base = Checkpoint::default();

        let mut a = Checkpoint::default();
        a.record_success("/a", Some("1"));
        let mut b = Checkpoint::default();
        b.record_success("/b", None);

        let mut sequential = base.clone();
        sequential.merge(&a);
        sequential.merge(&b);

        let mut reversed = base.clone();
        reversed.merge(&b);
        reversed.merge(&a);

        let mut together = Checkpoint::default();
        together.record_success("/a", Some("1"));
        together.record_success("/b", None);
        let mut single = base;
        single.merge(&together);

        assert_eq!(sequential.completed_files, single.completed_files);
        assert_eq!(reversed.completed_files, single.completed_files);
        assert_eq!(sequential.file_id_mapping, single.file_id_mapping);
    }

    #[test]
    fn merge_keeps_completed_and_failed_disjoint() {
        let mut disk = Checkpoint::default();
        disk.record_failure("/a", "old");
        disk.record_failure("/b", "old");
        disk.pending_files.push("/c".to_string());

        let mut delta = Checkpoint::default();
        delta.record_success("/a", Some("9"));
        delta.record_failure("/b", "new");
        delta.record_success("/c", None);

        disk.merge(&delta);

        assert!(disk.is_completed("/a"));
        assert_eq!(disk.failed_files, vec![FailedFile("/b".into(), "new".into())]);
        assert!(disk.pending_files.is_empty());
        for failure in &disk.failed_files {
            assert!(!disk.completed_files.contains(failure.path()));
        }
    }

    #[test]
    fn success_without_id_forgets_the_old_id() {
        let mut cp = Checkpoint::default();
        cp.record_success("/a", Some("old"));
        cp.record_success("/a", None);
        assert!(cp.is_completed("/a"));
        assert!(cp.file_id_mapping.is_empty());
        assert!(cp.believed_uploaded_ids().is_empty());
    }

    #[test]
    fn replace_pending_drops_paths_no_longer_queued() {
        let mut cp = Checkpoint {
            pending_files: vec!["/gone".to_string(), "/a".to_string()],
            ..Checkpoint::default()
        };
        cp.record_success("/done", None);
        cp.record_failure("/bad", "HTTP 400");

        cp.replace_pending(&[
            "/a".to_string(),
            "/done".to_string(),
            "/bad".to_string(),
            "/new".to_string(),
        ]);
        assert_eq!(cp.pending_files, vec!["/a".to_string(), "/new".to_string()]);

        cp.replace_pending(&[]);
        assert!(cp.pending_files.is_empty());
    }

    #[test]
    fn serializes_failures_as_pairs() {
        let mut cp = Checkpoint::default();
        cp.record_failure("/b", "HTTP 500");
        let json = serde_json::to_value(&cp).unwrap();
        assert_eq!(json["failed_files"], serde_json::json!([["/b", "HTTP 500"]]));

        let parsed: Checkpoint = serde_json::from_str(r#"{"completed_files": ["/a"]}"#).unwrap();
        assert!(parsed.is_completed("/a"));
        assert!(parsed.failed_files.is_empty());
    }

    #[test]
    fn reverse_id_lookup() {
        let mut cp = Checkpoint::default();
        cp.record_success("/a", Some("2"));
        cp.record_success("/b", Some("3"));
        assert_eq!(cp.paths_by_id().get("3"), Some(&"/b"));
        assert_eq!(
            cp.believed_uploaded_ids().into_iter().collect::<Vec<_>>(),
            vec!["2".to_string(), "3".to_string()]
        );
    }
}
