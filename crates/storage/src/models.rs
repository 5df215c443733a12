//! Identifiers and session state shared by every backend.

use crate::credentials::Credentials;
use derive_more::Display;

/// Backend-assigned identifier of a container (folder, key prefix, ...).
///
/// Opaque to callers: only the backend that issued it knows how to resolve it.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
#[display("{_0}")]
pub struct ContainerId(String);
impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Backend-assigned identifier of an uploaded object.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
#[display("{_0}")]
pub struct RemoteId(String);
impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Proof of a successful [`authenticate`](crate::RemoteStorage::authenticate).
///
/// Backends that need no credentials hand out anonymous sessions.
#[derive(Debug, Clone)]
pub struct Session {
    backend: String,
    credentials: Option<Credentials>,
}
impl Session {
    pub fn anonymous(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(backend: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            ..Self::anonymous(backend)
        }
    }

    /// Name of the backend that issued this session.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }
}
