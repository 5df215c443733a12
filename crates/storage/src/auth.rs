//! Session establishment.
//!
//! [`Authenticator::authenticate`] resolves credentials in order:
//!
//! 1. **Stored and valid**: reused as-is.
//! 2. **Stored, expiring, refreshable**: refreshed through the store and
//!    saved again.
//! 3. **Anything else**: the configured [`ConsentFlow`] runs, bounded by a
//!    timeout, and its result is saved for the next run.
//!
//! Without a consent flow, step 3 fails with
//! [`Unauthenticated`](ErrorKind::Unauthenticated).

use crate::credentials::{CredentialStore, Credentials};
use crate::error::{ErrorKind, Result};
use crate::models::Session;
use async_trait::async_trait;
use exn::ResultExt;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Default upper bound on how long interactive consent may block.
pub const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Obtains brand-new credentials from the user (browser authorization,
/// pasted token, ...). Blocks until the user responds.
#[async_trait]
pub trait ConsentFlow: Send + Sync {
    async fn request(&self) -> Result<Credentials>;
}

/// Console consent: prints instructions to stderr and reads a token pasted
/// on stdin.
///
/// The read happens on a blocking thread. If the surrounding timeout fires
/// the thread is abandoned, not interrupted; the process exits normally once
/// the run is over.
pub struct PromptConsent {
    instructions: String,
}
impl PromptConsent {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self { instructions: instructions.into() }
    }
}

#[async_trait]
impl ConsentFlow for PromptConsent {
    async fn request(&self) -> Result<Credentials> {
        let instructions = self.instructions.clone();
        let token = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut stderr = std::io::stderr().lock();
            writeln!(stderr, "{instructions}")?;
            write!(stderr, "Access token: ")?;
            stderr.flush()?;
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line.trim().to_string())
        })
        .await
        .or_raise(|| ErrorKind::BackendError("consent prompt panicked".to_string()))?
        .map_err(ErrorKind::Io)?;
        if token.is_empty() {
            exn::bail!(ErrorKind::Unauthenticated("no access token was entered".to_string()));
        }
        Ok(Credentials::new(token))
    }
}

/// Resolves a [`Session`] from a [`CredentialStore`], refreshing or asking
/// for consent as needed.
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    consent: Option<Arc<dyn ConsentFlow>>,
    timeout: Duration,
}
impl Authenticator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            consent: None,
            timeout: DEFAULT_CONSENT_TIMEOUT,
        }
    }

    pub fn with_consent(mut self, consent: Arc<dyn ConsentFlow>, timeout: Duration) -> Self {
        self.consent = Some(consent);
        self.timeout = timeout;
        self
    }

    #[instrument(skip(self))]
    pub async fn authenticate(&self, backend: &str) -> Result<Session> {
        if let Some(stored) = self.store.load().await? {
            if self.store.is_valid(&stored) {
                tracing::debug!("Reusing stored credentials");
                return Ok(Session::with_credentials(backend, stored));
            }
            if stored.refresh_token.is_some() {
                match self.store.refresh(&stored).await {
                    Ok(fresh) => {
                        self.store.save(&fresh).await?;
                        tracing::info!("Refreshed stored credentials");
                        return Ok(Session::with_credentials(backend, fresh));
                    },
                    Err(e) => tracing::warn!(error = ?e, "Could not refresh stored credentials"),
                }
            }
        }

        let Some(consent) = &self.consent else {
            exn::bail!(ErrorKind::Unauthenticated("no valid stored credentials".to_string()));
        };
        tracing::info!(timeout_secs = self.timeout.as_secs(), "Requesting authorization");
        let fresh = tokio::time::timeout(self.timeout, consent.request()).await.or_raise(|| ErrorKind::ConsentTimeout)??;
        self.store.save(&fresh).await?;
        Ok(Session::with_credentials(backend, fresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentialStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::OffsetDateTime;

    struct FixedConsent {
        calls: AtomicUsize,
        delay: Duration,
    }
    impl FixedConsent {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), delay })
        }
    }
    #[async_trait]
    impl ConsentFlow for FixedConsent {
        async fn request(&self) -> Result<Credentials> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Credentials::new("from-consent"))
        }
    }

    struct RefreshingStore {
        inner: StaticCredentialStore,
    }
    #[async_trait]
    impl CredentialStore for RefreshingStore {
        async fn load(&self) -> Result<Option<Credentials>> {
            self.inner.load().await
        }
        async fn save(&self, credentials: &Credentials) -> Result<()> {
            self.inner.save(credentials).await
        }
        async fn refresh(&self, _: &Credentials) -> Result<Credentials> {
            Ok(Credentials::new("refreshed").with_refresh_token("r2"))
        }
    }

    fn expired() -> Credentials {
        Credentials::new("old").with_refresh_token("r1").with_expiry(OffsetDateTime::now_utc())
    }

    #[tokio::test]
    async fn test_reuses_valid_credentials() {
        let store = Arc::new(StaticCredentialStore::new(Credentials::new("stored")));
        let consent = FixedConsent::new(Duration::ZERO);
        let auth = Authenticator::new(store).with_consent(consent.clone(), Duration::from_secs(1));
        let session = auth.authenticate("test").await.unwrap();
        assert_eq!(session.credentials().unwrap().token, "stored");
        assert_eq!(session.backend(), "test");
        assert_eq!(consent.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refreshes_expired_credentials() {
        let store = Arc::new(RefreshingStore { inner: StaticCredentialStore::new(expired()) });
        let auth = Authenticator::new(store.clone());
        let session = auth.authenticate("test").await.unwrap();
        assert_eq!(session.credentials().unwrap().token, "refreshed");
        assert_eq!(store.load().await.unwrap().unwrap().token, "refreshed");
    }

    #[tokio::test]
    async fn test_falls_back_to_consent_and_saves() {
        let store = Arc::new(StaticCredentialStore::new(expired()));
        let consent = FixedConsent::new(Duration::ZERO);
        let auth = Authenticator::new(store.clone()).with_consent(consent.clone(), Duration::from_secs(1));
        let session = auth.authenticate("test").await.unwrap();
        assert_eq!(session.credentials().unwrap().token, "from-consent");
        assert_eq!(consent.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.load().await.unwrap().unwrap().token, "from-consent");
    }

    #[tokio::test]
    async fn test_without_consent_is_unauthenticated() {
        let auth = Authenticator::new(Arc::new(StaticCredentialStore::default()));
        let err = auth.authenticate("test").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unauthenticated(_)));
        assert!(err.is_auth());
    }

    #[tokio::test(start_paused = true)]
    async fn test_consent_times_out() {
        let consent = FixedConsent::new(Duration::from_secs(600));
        let auth = Authenticator::new(Arc::new(StaticCredentialStore::default()))
            .with_consent(consent, Duration::from_secs(30));
        let err = auth.authenticate("test").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::ConsentTimeout));
    }
}
