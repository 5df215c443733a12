//! S3-compatible remote backend.
//!
//! Works with AWS S3 and S3-compatible services (Backblaze B2, MinIO,
//! Tigris, ...). S3 has no real folders, so a container is a key prefix
//! marked by an empty `prefix/` object.
//!
//! # Credentials
//!
//! Credentials come from the [`Authenticator`] the backend was built with.
//! The access key id is the credential token and the secret key is the
//! credential secret; a token of the form `KEY_ID:SECRET` (as pasted into
//! the consent prompt) is accepted as well.

use crate::RemoteStorage;
use crate::auth::Authenticator;
use crate::error::{ErrorKind, Result};
use crate::models::{ContainerId, RemoteId, Session};
use crate::path::{validate as validate_path, validate_name};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials as AwsCredentials, Region, retry::RetryConfig},
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
};
use exn::OptionExt;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::instrument;

/// Files larger than this are sent as a multipart upload in parts of this
/// size.
const PART_SIZE: u64 = 64 * 1024 * 1024;

/// S3-compatible storage backend.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use vidsplit_storage::Authenticator;
/// use vidsplit_storage::backend::S3Backend;
/// use vidsplit_storage::credentials::{Credentials, StaticCredentialStore};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = StaticCredentialStore::new(Credentials::new("key_id").with_secret("key_secret"));
/// let backend = S3Backend::new(
///     "b2",
///     "my-bucket",
///     Some("videos".to_string()),
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com".to_string()),
///     Authenticator::new(Arc::new(store)),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct S3Backend {
    name: String,
    bucket: String,
    prefix: Option<String>,
    region: String,
    endpoint: Option<String>,
    auth: Authenticator,
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix every container is placed under
    /// * `region` - AWS region or provider-specific region
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `auth` - Resolves the access key pair
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<String>,
        auth: Authenticator,
    ) -> Result<Self> {
        let prefix = prefix
            .map(validate_path)
            .transpose()?
            .map(|p| p.to_str().map(|s| s.replace('\\', "/")).ok_or_raise(|| ErrorKind::InvalidPath(p)))
            .transpose()?;
        Ok(Self {
            name: name.into(),
            bucket: bucket.into(),
            prefix,
            region: region.into(),
            endpoint,
            auth,
        })
    }

    fn client(&self, session: &Session) -> Result<Client> {
        let credentials = session
            .credentials()
            .ok_or_raise(|| ErrorKind::Unauthenticated("S3 requires an access key".to_string()))?;
        let (key_id, key_secret) = match &credentials.secret {
            Some(secret) => (credentials.token.as_str(), secret.as_str()),
            None => credentials
                .token
                .split_once(':')
                .ok_or_raise(|| ErrorKind::Unauthenticated("S3 access key has no secret".to_string()))?,
        };
        let credentials = AwsCredentials::new(key_id, key_secret, None, None, "vidsplit");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(self.region.clone()))
            // 1 initial attempt + 3 retries with exponential backoff
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Path-style addressing for S3-compatible services.
            .force_path_style(true);
        if let Some(endpoint_url) = &self.endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Client::from_conf(config_builder.build()))
    }

    /// Key prefix (without trailing slash) of a container.
    fn container_key(&self, container: &ContainerId) -> Result<String> {
        let validated = validate_path(container.as_str())?;
        let relative = validated
            .to_str()
            .ok_or_raise(|| ErrorKind::InvalidPath(validated.clone()))?
            .replace('\\', "/");
        Ok(join_key(self.prefix.as_deref(), &relative))
    }

    /// Container identifier relative to the configured prefix.
    fn child_container(parent: Option<&ContainerId>, name: &str) -> ContainerId {
        match parent {
            Some(parent) => ContainerId::new(format!("{}/{name}", parent.as_str().trim_end_matches('/'))),
            None => ContainerId::new(name),
        }
    }

    async fn multipart_upload(&self, client: &Client, local: &Path, key: &str) -> Result<()> {
        let created = client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ErrorKind::Network(DisplayErrorContext(e).to_string()))?;
        let upload_id = created
            .upload_id()
            .ok_or_raise(|| ErrorKind::BackendError("S3 returned no multipart upload id".to_string()))?
            .to_string();

        match self.upload_parts(client, local, key, &upload_id).await {
            Ok(parts) => {
                let completed = CompletedMultipartUpload::builder().set_parts(Some(parts)).build();
                client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await
                    .map_err(|e| ErrorKind::Network(DisplayErrorContext(e).to_string()))?;
                Ok(())
            },
            Err(e) => {
                let aborted = client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await;
                if let Err(abort) = aborted {
                    tracing::warn!(key, error = %DisplayErrorContext(abort), "Could not abort multipart upload");
                }
                Err(e)
            },
        }
    }

    async fn upload_parts(&self, client: &Client, local: &Path, key: &str, upload_id: &str) -> Result<Vec<CompletedPart>> {
        let mut file = tokio::fs::File::open(local).await.map_err(|e| ErrorKind::from_io(e, local))?;
        let mut parts = Vec::new();
        for part_number in 1.. {
            let mut chunk = Vec::new();
            (&mut file)
                .take(PART_SIZE)
                .read_to_end(&mut chunk)
                .await
                .map_err(|e| ErrorKind::from_io(e, local))?;
            if chunk.is_empty() {
                break;
            }
            let uploaded = client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .map_err(|e| ErrorKind::Network(DisplayErrorContext(e).to_string()))?;
            tracing::trace!(key, part_number, "Uploaded part");
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
        }
        Ok(parts)
    }
}

fn join_key(prefix: Option<&str>, relative: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), relative.trim_start_matches('/')),
        None => relative.to_string(),
    }
}

#[async_trait]
impl RemoteStorage for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authenticate(&self) -> Result<Session> {
        let session = self.auth.authenticate(&self.name).await?;
        // Fail here rather than on the first request if the key is unusable.
        self.client(&session)?;
        Ok(session)
    }

    #[instrument(skip(self, session), fields(backend = %self.name))]
    async fn create_container(&self, session: &Session, name: &str, parent: Option<&ContainerId>) -> Result<ContainerId> {
        let name = validate_name(name)?;
        let id = Self::child_container(parent, name);
        let marker = format!("{}/", self.container_key(&id)?);
        self.client(session)?
            .put_object()
            .bucket(&self.bucket)
            .key(&marker)
            .body(ByteStream::from_static(b""))
            .send()
            .await
            .map_err(|e| ErrorKind::Network(DisplayErrorContext(e).to_string()))?;
        tracing::debug!(container = %id, "Container ready");
        Ok(id)
    }

    #[instrument(skip(self, session), fields(backend = %self.name))]
    async fn upload(&self, session: &Session, local: &Path, container: &ContainerId) -> Result<RemoteId> {
        let file_name = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_raise(|| ErrorKind::InvalidPath(local.to_path_buf()))?;
        let size = tokio::fs::metadata(local).await.map_err(|e| ErrorKind::from_io(e, local))?.len();
        let key = format!("{}/{file_name}", self.container_key(container)?);
        let client = self.client(session)?;
        if size <= PART_SIZE {
            let body = ByteStream::from_path(local)
                .await
                .map_err(|e| ErrorKind::BackendError(e.to_string()))?;
            client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(body)
                .send()
                .await
                .map_err(|e| ErrorKind::Network(DisplayErrorContext(e).to_string()))?;
        } else {
            self.multipart_upload(&client, local, &key).await?;
        }
        tracing::debug!(key, size, "Uploaded file");
        Ok(RemoteId::new(key))
    }
}
