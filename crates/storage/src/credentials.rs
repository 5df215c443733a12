//! Credential persistence.
//!
//! A [`CredentialStore`] owns the credentials used to open a remote session
//! across runs. Stores decide where credentials live and whether they can be
//! refreshed; the [`Authenticator`](crate::Authenticator) decides when to
//! load, refresh, or fall back to interactive consent.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

/// Credentials are treated as expired this long before their actual expiry,
/// so a long upload never starts with a token that is about to lapse.
pub const EXPIRY_MARGIN: Duration = Duration::minutes(5);

/// Whatever a backend needs to open a session.
///
/// Token-based services use `token` (plus an optional `refresh_token` and
/// expiry); key-pair services such as S3 use `token` as the key id and
/// `secret` as the secret key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, with = "time::serde::timestamp::option", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<OffsetDateTime>,
}
impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            secret: None,
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// `true` if the credentials expire before `now + margin`. Credentials
    /// without an expiry never expire.
    #[must_use]
    pub fn expires_within(&self, margin: Duration, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now + margin)
    }
}
// Never print secrets into logs.
impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Persists credentials between runs.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load previously saved credentials, or `None` if nothing is stored.
    async fn load(&self) -> Result<Option<Credentials>>;

    /// Persist credentials for the next run, replacing anything stored.
    async fn save(&self, credentials: &Credentials) -> Result<()>;

    /// Whether `credentials` can be used right now. Defaults to "not within
    /// [`EXPIRY_MARGIN`] of expiring".
    fn is_valid(&self, credentials: &Credentials) -> bool {
        !credentials.expires_within(EXPIRY_MARGIN, OffsetDateTime::now_utc())
    }

    /// Exchange expiring credentials for fresh ones. Stores that have no
    /// way to refresh return [`ErrorKind::Unauthenticated`].
    async fn refresh(&self, credentials: &Credentials) -> Result<Credentials> {
        let _ = credentials;
        exn::bail!(ErrorKind::Unauthenticated("credential store cannot refresh tokens".to_string()))
    }
}

/// Stores credentials as JSON in a file (readable only by the owner on Unix).
pub struct FileCredentialStore {
    path: PathBuf,
}
impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Credentials(self.path.clone())),
        };
        let credentials = serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Credentials(self.path.clone()))?;
        tracing::debug!(path = %self.path.display(), "Loaded stored credentials");
        Ok(Some(credentials))
    }

    async fn save(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Credentials(self.path.clone()))?;
        }
        let json = serde_json::to_vec_pretty(credentials).or_raise(|| ErrorKind::Credentials(self.path.clone()))?;
        tokio::fs::write(&self.path, json).await.or_raise(|| ErrorKind::Credentials(self.path.clone()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&self.path, permissions)
                .await
                .or_raise(|| ErrorKind::Credentials(self.path.clone()))?;
        }
        tracing::debug!(path = %self.path.display(), "Saved credentials");
        Ok(())
    }
}

/// Keeps credentials in memory only; used for keys supplied by configuration.
#[derive(Default)]
pub struct StaticCredentialStore {
    credentials: RwLock<Option<Credentials>>,
}
impl StaticCredentialStore {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials: RwLock::new(Some(credentials)) }
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>> {
        Ok(self.credentials.read().await.clone())
    }

    async fn save(&self, credentials: &Credentials) -> Result<()> {
        *self.credentials.write().await = Some(credentials.clone());
        Ok(())
    }
}
