//! Local filesystem "remote".
//!
//! Containers are directories below a configured root and uploads are plain
//! copies. Useful for a mounted network share or a synced folder.

use crate::error::{ErrorKind, Result};
use crate::models::{ContainerId, RemoteId, Session};
use crate::path::{available_path, validate as validate_path, validate_name};
use crate::RemoteStorage;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

/// Local filesystem storage backend.
///
/// Container identifiers are paths relative to the configured root, and
/// object identifiers are relative paths of the uploaded files.
///
/// # Examples
///
/// ```no_run
/// use vidsplit_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("nas", "/mnt/nas/videos")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local backend rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, is not a directory, or
    /// cannot be created.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Constructor stays sync; this happens once per run.
            sync_create_dir(&root).map_err(|e| ErrorKind::from_io(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, container: &ContainerId) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(container.as_str())?))
    }

    fn relative_id(&self, absolute: &Path) -> Result<String> {
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{}` is not within root `{}`", absolute.display(), self.root.display()))
        })?;
        let relative = validate_path(relative)?;
        // Identifiers always use forward slashes, whatever the platform.
        let parts: Vec<_> = relative.components().map(|c| c.as_os_str().to_string_lossy()).collect();
        Ok(parts.join("/"))
    }
}

#[async_trait]
impl RemoteStorage for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authenticate(&self) -> Result<Session> {
        if !fs::try_exists(&self.root).await.map_err(|e| ErrorKind::from_io(e, &self.root))? {
            exn::bail!(ErrorKind::NotFound(self.root.clone()));
        }
        Ok(Session::anonymous(&self.name))
    }

    #[instrument(skip(self, _session), fields(backend = %self.name))]
    async fn create_container(&self, _session: &Session, name: &str, parent: Option<&ContainerId>) -> Result<ContainerId> {
        let name = validate_name(name)?;
        let base = match parent {
            Some(parent) => self.container_dir(parent)?,
            None => self.root.clone(),
        };
        let dir = base.join(name);
        fs::create_dir_all(&dir).await.map_err(|e| ErrorKind::from_io(e, &dir))?;
        let id = ContainerId::new(self.relative_id(&dir)?);
        tracing::debug!(container = %id, "Container ready");
        Ok(id)
    }

    #[instrument(skip(self, _session), fields(backend = %self.name))]
    async fn upload(&self, _session: &Session, local: &Path, container: &ContainerId) -> Result<RemoteId> {
        let file_name = local
            .file_name()
            .ok_or_else(|| ErrorKind::InvalidPath(local.to_path_buf()))?;
        let dir = self.container_dir(container)?;
        if !fs::try_exists(&dir).await.map_err(|e| ErrorKind::from_io(e, &dir))? {
            exn::bail!(ErrorKind::NotFound(dir));
        }
        let target = available_path(&dir, file_name).await?;
        let bytes = fs::copy(local, &target).await.map_err(|e| ErrorKind::from_io(e, local))?;
        let id = RemoteId::new(self.relative_id(&target)?);
        tracing::debug!(remote = %id, bytes, "Uploaded file");
        Ok(id)
    }
}
