//! In-memory remote backend for testing.

use crate::RemoteStorage;
use crate::error::{ErrorKind, Result};
use crate::models::{ContainerId, RemoteId, Session};
use crate::path::validate_name;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tokio::sync::RwLock;

/// One file recorded by [`MockBackend::upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockUpload {
    pub id: RemoteId,
    pub container: ContainerId,
    pub name: String,
    pub size: u64,
}

#[derive(Default)]
struct State {
    containers: HashMap<ContainerId, (Option<ContainerId>, String)>,
    uploads: Vec<MockUpload>,
    next_id: u64,
}

/// In-memory storage backend for testing.
///
/// Containers and uploads are recorded behind a [`RwLock`] so tests can
/// inspect what the pipeline did. Authentication and individual uploads can
/// be told to fail.
///
/// # Examples
///
/// ```
/// use vidsplit_storage::RemoteStorage;
/// use vidsplit_storage::backend::MockBackend;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::default();
/// let session = backend.authenticate().await?;
/// let container = backend.create_container(&session, "Holiday", None).await?;
/// assert_eq!(backend.containers().await, vec![container]);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    fail_auth: bool,
    fail_uploads: HashSet<String>,
    state: RwLock<State>,
}

impl MockBackend {
    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Every call to [`authenticate`](RemoteStorage::authenticate) fails.
    pub fn failing_auth(mut self) -> Self {
        self.fail_auth = true;
        self
    }

    /// Uploads of a file with this file name fail with a network error.
    pub fn failing_upload(mut self, file_name: impl Into<String>) -> Self {
        self.fail_uploads.insert(file_name.into());
        self
    }

    /// Containers created so far, in creation order.
    pub async fn containers(&self) -> Vec<ContainerId> {
        let state = self.state.read().await;
        let mut containers: Vec<_> = state.containers.keys().cloned().collect();
        containers.sort_by_key(|id| id_number(id.as_str()));
        containers
    }

    /// Name and parent of a created container.
    pub async fn container(&self, id: &ContainerId) -> Option<(Option<ContainerId>, String)> {
        self.state.read().await.containers.get(id).cloned()
    }

    /// Uploads recorded so far, in upload order.
    pub async fn uploads(&self) -> Vec<MockUpload> {
        self.state.read().await.uploads.clone()
    }

    fn check_session(&self, session: &Session) -> Result<()> {
        if session.backend() != self.name {
            exn::bail!(ErrorKind::Unauthenticated(format!("session belongs to `{}`", session.backend())));
        }
        Ok(())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            fail_auth: false,
            fail_uploads: HashSet::new(),
            state: RwLock::new(State::default()),
        }
    }
}

fn id_number(id: &str) -> u64 {
    id.rsplit('-').next().and_then(|n| n.parse().ok()).unwrap_or(u64::MAX)
}

#[async_trait]
impl RemoteStorage for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authenticate(&self) -> Result<Session> {
        if self.fail_auth {
            exn::bail!(ErrorKind::Unauthenticated("mock backend refuses to authenticate".to_string()));
        }
        Ok(Session::anonymous(&self.name))
    }

    async fn create_container(&self, session: &Session, name: &str, parent: Option<&ContainerId>) -> Result<ContainerId> {
        self.check_session(session)?;
        let name = validate_name(name)?.to_string();
        let mut state = self.state.write().await;
        if let Some(parent) = parent
            && !state.containers.contains_key(parent)
        {
            exn::bail!(ErrorKind::NotFound(parent.as_str().into()));
        }
        let existing = state
            .containers
            .iter()
            .find(|(_, (p, n))| p.as_ref() == parent && *n == name)
            .map(|(id, _)| id.clone());
        if let Some(id) = existing {
            return Ok(id);
        }
        state.next_id += 1;
        let id = ContainerId::new(format!("mock-container-{}", state.next_id));
        state.containers.insert(id.clone(), (parent.cloned(), name));
        Ok(id)
    }

    async fn upload(&self, session: &Session, local: &Path, container: &ContainerId) -> Result<RemoteId> {
        self.check_session(session)?;
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ErrorKind::InvalidPath(local.to_path_buf()))?;
        let size = tokio::fs::metadata(local).await.map_err(|e| ErrorKind::from_io(e, local))?.len();
        if self.fail_uploads.contains(&name) {
            exn::bail!(ErrorKind::Network(format!("mock upload of {name} failed")));
        }
        let mut state = self.state.write().await;
        if !state.containers.contains_key(container) {
            exn::bail!(ErrorKind::NotFound(container.as_str().into()));
        }
        state.next_id += 1;
        let id = RemoteId::new(format!("mock-object-{}", state.next_id));
        state.uploads.push(MockUpload {
            id: id.clone(),
            container: container.clone(),
            name,
            size,
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_containers_and_uploads() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("a.zip");
        std::fs::write(&file, b"12345").unwrap();

        let backend = MockBackend::default();
        let session = backend.authenticate().await.unwrap();
        let parent = backend.create_container(&session, "Videos", None).await.unwrap();
        let child = backend.create_container(&session, "Holiday", Some(&parent)).await.unwrap();
        assert_eq!(backend.create_container(&session, "Holiday", Some(&parent)).await.unwrap(), child);
        assert_eq!(backend.containers().await, vec![parent.clone(), child.clone()]);
        assert_eq!(backend.container(&child).await, Some((Some(parent), "Holiday".to_string())));

        backend.upload(&session, &file, &child).await.unwrap();
        let uploads = backend.uploads().await;
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].name, "a.zip");
        assert_eq!(uploads[0].size, 5);
        assert_eq!(uploads[0].container, child);
    }

    #[tokio::test]
    async fn test_configured_failures() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("bad.zip");
        std::fs::write(&file, b"x").unwrap();

        let err = MockBackend::default().failing_auth().authenticate().await.unwrap_err();
        assert!(err.is_auth());

        let backend = MockBackend::default().failing_upload("bad.zip");
        let session = backend.authenticate().await.unwrap();
        let container = backend.create_container(&session, "c", None).await.unwrap();
        let err = backend.upload(&session, &file, &container).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
        assert!(backend.uploads().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_foreign_session() {
        let backend = MockBackend::default().with_name("mine");
        let err = backend
            .create_container(&Session::anonymous("other"), "c", None)
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unauthenticated(_)));
    }
}
