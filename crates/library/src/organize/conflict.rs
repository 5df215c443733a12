use crate::organize::STAGING_PREFIX;
use crate::organize::error::{ErrorKind as OrganizeErrorKind, Result as OrganizeResult};
use exn::ResultExt;
use std::ffi::OsStr;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use vidsplit_storage::available_path;

/// Creates a fresh, hidden staging directory for partition `index` under
/// `root`. A leftover directory from an earlier interrupted run is never
/// reused.
pub(crate) async fn create_staging(root: &Path, index: usize) -> OrganizeResult<PathBuf> {
    let name = format!("{STAGING_PREFIX}{index}");
    let staging = available_path(root, OsStr::new(&name))
        .await
        .or_raise(|| OrganizeErrorKind::Staging(root.join(&name)))?;
    fs::create_dir(&staging)
        .await
        .or_raise(|| OrganizeErrorKind::Staging(staging.clone()))?;
    Ok(staging)
}

/// Moves `source` into `dir`, keeping its file name. A file already using
/// that name gets a ` (n)` suffix instead of being overwritten.
pub(crate) async fn move_into(source: &Path, dir: &Path) -> OrganizeResult<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| OrganizeErrorKind::Move(source.to_path_buf()))?;
    let target = available_path(dir, file_name)
        .await
        .or_raise(|| OrganizeErrorKind::Move(source.to_path_buf()))?;
    match fs::rename(source, &target).await {
        Ok(()) => {},
        // The source sits on another filesystem (a mount inside the root).
        Err(e) if e.kind() == IoErrorKind::CrossesDevices => {
            tracing::debug!(path = %source.display(), "Falling back to copy across filesystems");
            copy_then_remove(source, &target).await?;
        },
        Err(e) => return Err(e).or_raise(|| OrganizeErrorKind::Move(source.to_path_buf())),
    }
    Ok(target)
}

/// Copies `source` to `target`, then removes `source`. If either step fails,
/// `target` is removed again so the file only exists where it started.
async fn copy_then_remove(source: &Path, target: &Path) -> OrganizeResult<()> {
    let result = match fs::copy(source, target).await {
        Ok(_) => fs::remove_file(source).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        if let Err(cleanup) = fs::remove_file(target).await
            && cleanup.kind() != IoErrorKind::NotFound
        {
            tracing::warn!(path = %target.display(), error = %cleanup, "Could not remove partial copy");
        }
        return Err(e).or_raise(|| OrganizeErrorKind::Move(source.to_path_buf()));
    }
    Ok(())
}

/// Renames a filled staging directory to its final name. Refuses to touch
/// an existing file or directory of that name.
pub(crate) async fn finalize(staging: &Path, target: &Path) -> OrganizeResult<()> {
    let taken = fs::try_exists(target)
        .await
        .or_raise(|| OrganizeErrorKind::Rename(target.to_path_buf()))?;
    if taken {
        exn::bail!(OrganizeErrorKind::Conflict(target.to_path_buf()));
    }
    fs::rename(staging, target)
        .await
        .or_raise(|| OrganizeErrorKind::Rename(target.to_path_buf()))
}

/// Removes a staging directory that received no files.
pub(crate) async fn discard_staging(staging: &Path) {
    if let Err(e) = fs::remove_dir(staging).await {
        tracing::warn!(path = %staging.display(), error = %e, "Could not remove empty staging directory");
    }
}
