//! Local file discovery.

use std::ffi::OsStr;
use std::path::Path;

use kb_ingest_models::UploadTask;
use walkdir::WalkDir;

use crate::IngestError;

/// Recursively lists every regular, non-hidden file under `dir` as a
/// pending task, sorted by path.
///
/// A file is hidden when its basename starts with `.`. Hidden directories
/// are still descended into. Entries that cannot be read are logged and
/// left out.
///
/// # Errors
///
/// Returns [`IngestError::Config`] if `dir` is not a directory.
pub fn scan_directory(dir: &Path) -> Result<Vec<UploadTask>, IngestError> {
    if !dir.is_dir() {
        return Err(IngestError::Config {
            message: format!("source directory not found: {}", dir.display()),
        });
    }

    let mut tasks = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() || is_hidden(entry.file_name()) {
            continue;
        }
        match entry.metadata() {
            Ok(metadata) => tasks.push(UploadTask::new(entry.into_path(), metadata.len())),
            Err(e) => log::warn!("Skipping {}: {e}", entry.path().display()),
        }
    }

    tasks.sort_by(|a, b| a.file_path.cmp(&b.file_path));
    Ok(tasks)
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{scratch_dir, write_files};

    #[test]
    fn skips_hidden_files_but_not_hidden_dirs() {
        let dir = scratch_dir("kb_ingest_scan_hidden");
        write_files(
            &dir,
            &[
                ("b.txt", "bb"),
                ("a.txt", "a"),
                (".DS_Store", "x"),
                ("nested/c.pdf", "ccc"),
                (".cache/d.txt", "dddd"),
            ],
        );

        let tasks = scan_directory(&dir).unwrap();
        let names: Vec<String> = tasks
            .iter()
            .map(|t| {
                t.file_path
                    .strip_prefix(&dir)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();

        assert_eq!(names, vec![".cache/d.txt", "a.txt", "b.txt", "nested/c.pdf"]);
        assert_eq!(tasks[2].file_size, 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_is_a_config_error() {
        let dir = std::env::temp_dir().join("kb_ingest_scan_does_not_exist");
        let _ = std::fs::remove_dir_all(&dir);
        assert!(matches!(
            scan_directory(&dir),
            Err(IngestError::Config { .. })
        ));
    }
}
