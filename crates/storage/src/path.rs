//! Path and name validation for remote containers and objects.
//!
//! Container identifiers issued by path-based backends (local directories,
//! S3 key prefixes) are relative paths, so they get the same traversal
//! checks as any other storage path. Container and object *names* are a
//! single path segment.

use crate::error::{ErrorKind, Result};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Maximum number of ` (n)` suffixes tried before giving up on a free name.
const MAX_DUPLICATE_SUFFIX: u32 = 10_000;

/// Validates a relative storage path, resolving `.` and `..` without ever
/// leaving the storage root. Null bytes and platform prefixes are rejected.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use vidsplit_storage::validate_path;
///
/// assert_eq!(validate_path("Holiday/./Holiday_1_3Files.zip").unwrap(), Path::new("Holiday/Holiday_1_3Files.zip"));
/// assert!(validate_path("../outside").is_err());
/// assert!(validate_path("").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(s) if s.as_encoded_bytes().contains(&0) => {
                exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()))
            },
            Component::Normal(s) => components.push(s),
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
    }
    Ok(components.into_iter().collect())
}

/// Validates a container or object name: non-empty, a single path segment,
/// no null bytes, and not `.` or `..`.
pub fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    let invalid = trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\', '\0']);
    if invalid {
        exn::bail!(ErrorKind::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}

/// Returns `dir/file_name`, or the first `dir/stem (n).ext` that does not
/// exist yet when the plain name is taken.
///
/// Assumes no other process is creating files in `dir` concurrently.
pub async fn available_path(dir: &Path, file_name: &OsStr) -> Result<PathBuf> {
    let candidate = dir.join(file_name);
    match tokio::fs::try_exists(&candidate).await {
        Ok(false) => return Ok(candidate),
        Ok(true) => {},
        Err(e) => exn::bail!(ErrorKind::from_io(e, candidate)),
    }
    let as_path = Path::new(file_name);
    let stem = as_path.file_stem().unwrap_or(file_name).to_string_lossy();
    let extension = as_path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
    for n in 2..=MAX_DUPLICATE_SUFFIX {
        let candidate = dir.join(format!("{stem} ({n}){extension}"));
        match tokio::fs::try_exists(&candidate).await {
            Ok(false) => return Ok(candidate),
            Ok(true) => continue,
            Err(e) => exn::bail!(ErrorKind::from_io(e, candidate)),
        }
    }
    exn::bail!(ErrorKind::BackendError(format!(
        "no free name for {} in {}",
        file_name.to_string_lossy(),
        dir.display()
    )))
}
