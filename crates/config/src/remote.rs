use crate::error::{ErrorKind, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONSENT_TIMEOUT_SECS: u64 = 300;

fn default_name() -> String {
    "remote".to_string()
}

fn default_consent_timeout() -> u64 {
    DEFAULT_CONSENT_TIMEOUT_SECS
}

/// Where archives are uploaded to, when uploading is requested.
///
/// ```toml
/// [remote]
/// name = "b2"
/// type = "s3"
/// bucket = "my-videos"
/// region = "us-west-004"
/// endpoint = "https://s3.us-west-004.backblazeb2.com"
/// parent = "organized"
/// consent_timeout = 120
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteConfig {
    /// Used in log messages and to name the credential file.
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(flatten)]
    pub backend: BackendConfig,
    /// Container new run containers are created under; top level if unset.
    #[serde(default)]
    pub parent: Option<String>,
    /// Where credentials are persisted between runs. Resolved to a file in
    /// the platform data directory when unset.
    #[serde(default)]
    pub credentials: Option<PathBuf>,
    /// Seconds to wait for interactive authorization.
    #[serde(default = "default_consent_timeout")]
    pub consent_timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// A directory (typically a mounted share) standing in for the remote.
    Local { path: PathBuf },
    /// An S3-compatible object store.
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: Option<String>,
        region: String,
        #[serde(default)]
        endpoint: Option<String>,
        /// When both keys are configured they are used as-is and never
        /// persisted; otherwise they come from the credential store.
        #[serde(default)]
        key_id: Option<String>,
        #[serde(default)]
        key_secret: Option<String>,
    },
}

impl RemoteConfig {
    pub fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.consent_timeout)
    }

    /// Credential file path, if one was configured or has been resolved.
    pub fn credentials_path(&self) -> Option<&Path> {
        self.credentials.as_deref()
    }

    pub(crate) fn resolve_credentials(&mut self, data_dir: Option<&Path>) {
        if self.credentials.is_none()
            && let Some(dir) = data_dir
        {
            self.credentials = Some(dir.join(format!("{}.credentials.json", self.name)));
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            exn::bail!(ErrorKind::invalid("remote.name", "must be a non-empty single path segment"));
        }
        if self.consent_timeout == 0 {
            exn::bail!(ErrorKind::invalid("remote.consent_timeout", "must be at least one second"));
        }
        if let Some(parent) = &self.parent
            && parent.trim().is_empty()
        {
            exn::bail!(ErrorKind::invalid("remote.parent", "must not be empty when set"));
        }
        match &self.backend {
            BackendConfig::Local { path } => {
                if !path.is_absolute() {
                    exn::bail!(ErrorKind::invalid("remote.path", "must be an absolute path"));
                }
            },
            BackendConfig::S3 {
                bucket,
                region,
                key_id,
                key_secret,
                ..
            } => {
                if bucket.trim().is_empty() {
                    exn::bail!(ErrorKind::invalid("remote.bucket", "must not be empty"));
                }
                if region.trim().is_empty() {
                    exn::bail!(ErrorKind::invalid("remote.region", "must not be empty"));
                }
                if key_id.is_some() != key_secret.is_some() {
                    exn::bail!(ErrorKind::invalid("remote.key_id", "key_id and key_secret must be set together"));
                }
            },
        }
        Ok(())
    }
}
