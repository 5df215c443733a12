//! Remote storage backend trait and implementations.
//!
//! This module defines the [`RemoteStorage`] trait, which provides a unified
//! interface for the three remote operations the pipeline needs: opening a
//! session, creating a container, and uploading a file into it.

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::{MockBackend, MockUpload};
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use crate::models::{ContainerId, RemoteId, Session};
use async_trait::async_trait;
use std::path::Path;

/// Unified interface for remote storage backends.
///
/// A backend hands out a [`Session`] from [`authenticate`](Self::authenticate)
/// and every other operation requires one. Containers are whatever the
/// service uses to group objects (a directory, a key prefix, a folder).
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use vidsplit_storage::{RemoteStorage, error::Result};
///
/// async fn upload_one(backend: &dyn RemoteStorage, archive: &Path) -> Result<()> {
///     let session = backend.authenticate().await?;
///     let container = backend.create_container(&session, "Holiday", None).await?;
///     let id = backend.upload(&session, archive, &container).await?;
///     println!("uploaded as {id}");
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Name of the configured backend (taken from the configuration). Used
    /// for logging only.
    fn name(&self) -> &str;

    /// Open a session, loading, refreshing, or requesting credentials as the
    /// backend requires.
    ///
    /// Returns [`Unauthenticated`](crate::error::ErrorKind::Unauthenticated)
    /// or [`ConsentTimeout`](crate::error::ErrorKind::ConsentTimeout) when no
    /// usable credentials can be obtained.
    async fn authenticate(&self) -> Result<Session>;

    /// Create a container named `name`, inside `parent` when given, or at
    /// the top level of the backend otherwise.
    ///
    /// # Notes
    /// - Creating a container that already exists is not an error; the
    ///   existing container is returned.
    async fn create_container(&self, session: &Session, name: &str, parent: Option<&ContainerId>) -> Result<ContainerId>;

    /// Upload the local file at `local` into `container`, keeping its file
    /// name.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the local
    /// file does not exist.
    async fn upload(&self, session: &Session, local: &Path, container: &ContainerId) -> Result<RemoteId>;
}
