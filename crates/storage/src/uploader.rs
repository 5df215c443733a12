use crate::BackendHandle;
use crate::error::Result;
use crate::models::{ContainerId, RemoteId, Session};
use crate::path::validate_name;
use std::path::Path;
use tracing::instrument;

/// A remote backend plus the parent container new containers are created
/// under.
#[derive(Clone)]
pub struct Uploader {
    backend: BackendHandle,
    parent: Option<ContainerId>,
}
impl Uploader {
    pub fn new(backend: BackendHandle, parent: Option<ContainerId>) -> Self {
        Self { backend, parent }
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    pub fn parent(&self) -> Option<&ContainerId> {
        self.parent.as_ref()
    }

    /// Open an authenticated session. Nothing can be uploaded without one.
    #[instrument(skip(self), fields(backend = %self.name()))]
    pub async fn authenticate(&self) -> Result<UploadSession<'_>> {
        let session = self.backend.authenticate().await?;
        tracing::info!("Authenticated with remote storage");
        Ok(UploadSession { uploader: self, session })
    }
}

/// An authenticated [`Uploader`].
pub struct UploadSession<'a> {
    uploader: &'a Uploader,
    session: Session,
}
impl UploadSession<'_> {
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Create (or reuse) the container `name` under the configured parent.
    #[instrument(skip(self), fields(backend = %self.uploader.name()))]
    pub async fn create_container(&self, name: &str) -> Result<ContainerId> {
        let name = validate_name(name)?;
        let id = self
            .uploader
            .backend
            .create_container(&self.session, name, self.uploader.parent())
            .await?;
        tracing::info!(container = %id, "Created remote container");
        Ok(id)
    }

    /// Upload a local file into `container`.
    #[instrument(skip(self), fields(backend = %self.uploader.name()))]
    pub async fn upload(&self, local: &Path, container: &ContainerId) -> Result<RemoteId> {
        let id = self.uploader.backend.upload(&self.session, local, container).await?;
        tracing::info!(remote = %id, "Uploaded archive");
        Ok(id)
    }
}
