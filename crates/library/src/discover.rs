//! Recursive discovery of eligible video files.

use crate::error::{ErrorKind, Result};
use crate::organize::STAGING_PREFIX;
use exn::ResultExt;
use std::ffi::OsString;
use std::fs::FileType;
use std::path::{Path, PathBuf};
use tokio::fs;

/// A discovered file. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
}
impl FileEntry {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self { path: path.into(), size }
    }
}

/// Case-insensitive extension filter.
#[derive(Debug, Clone)]
pub struct Extensions(Vec<String>);
impl Extensions {
    pub fn new(extensions: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self(
            extensions
                .into_iter()
                .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        )
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.0.iter().any(|allowed| allowed.eq_ignore_ascii_case(e)))
    }
}

/// Walks `root` recursively and returns every regular file whose extension
/// matches, in discovery order.
///
/// Entries within a directory are visited in file-name order, so discovery
/// order is reproducible. Symlinks, special files and staging directories
/// are ignored; unreadable subdirectories are logged and skipped.
pub async fn discover(root: &Path, extensions: &Extensions) -> Result<Vec<FileEntry>> {
    let mut files = Vec::new();
    let mut stack = vec![read_sorted(root).await.or_raise(|| ErrorKind::Discovery)?.into_iter()];
    while let Some(entries) = stack.last_mut() {
        let Some((path, file_type)) = entries.next() else {
            stack.pop();
            continue;
        };
        if file_type.is_dir() {
            if is_staging(&path) {
                tracing::debug!(path = %path.display(), "Ignoring staging directory");
                continue;
            }
            match read_sorted(&path).await {
                Ok(children) => stack.push(children.into_iter()),
                Err(e) => tracing::warn!(path = %path.display(), error = ?e, "Skipping unreadable directory"),
            }
        } else if file_type.is_file() && extensions.matches(&path) {
            match fs::metadata(&path).await {
                Ok(metadata) => files.push(FileEntry::new(path, metadata.len())),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable file"),
            }
        }
    }
    tracing::debug!(root = %root.display(), files = files.len(), "Discovery complete");
    Ok(files)
}

fn is_staging(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(STAGING_PREFIX))
}

async fn read_sorted(dir: &Path) -> std::io::Result<Vec<(PathBuf, FileType)>> {
    let mut read = fs::read_dir(dir).await?;
    let mut entries: Vec<(OsString, PathBuf, FileType)> = Vec::new();
    while let Some(entry) = read.next_entry().await? {
        // `file_type` does not follow symlinks.
        let file_type = entry.file_type().await?;
        entries.push((entry.file_name(), entry.path(), file_type));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries.into_iter().map(|(_, path, file_type)| (path, file_type)).collect())
}
