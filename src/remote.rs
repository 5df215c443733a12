//! Builds the uploader for the configured remote.

use miette::miette;
use std::sync::Arc;
use vidsplit_config::{BackendConfig, RemoteConfig};
use vidsplit_storage::backend::LocalBackend;
use vidsplit_storage::{ContainerId, Uploader};

pub(crate) fn uploader(config: &RemoteConfig) -> miette::Result<Uploader> {
    let parent = config.parent.clone().map(ContainerId::new);
    match &config.backend {
        BackendConfig::Local { path } => {
            let backend = LocalBackend::new(&config.name, path).map_err(|e| miette!("{e:?}"))?;
            Ok(Uploader::new(Arc::new(backend), parent))
        },
        #[cfg(feature = "s3")]
        BackendConfig::S3 {
            bucket,
            prefix,
            region,
            endpoint,
            key_id,
            key_secret,
        } => {
            use vidsplit_storage::backend::S3Backend;
            use vidsplit_storage::credentials::{FileCredentialStore, StaticCredentialStore};
            use vidsplit_storage::{Authenticator, Credentials, PromptConsent};

            let auth = match (key_id, key_secret) {
                (Some(id), Some(secret)) => Authenticator::new(Arc::new(StaticCredentialStore::new(
                    Credentials::new(id).with_secret(secret),
                ))),
                _ => {
                    let path = config
                        .credentials_path()
                        .ok_or_else(|| miette!("no credential file configured for remote {}", config.name))?;
                    let consent = PromptConsent::new(format!(
                        "Paste an access key for bucket {bucket} as KEY_ID:SECRET to authorize {}.",
                        config.name
                    ));
                    Authenticator::new(Arc::new(FileCredentialStore::new(path)))
                        .with_consent(Arc::new(consent), config.consent_timeout())
                },
            };
            let backend = S3Backend::new(&config.name, bucket, prefix.clone(), region, endpoint.clone(), auth)
                .map_err(|e| miette!("{e:?}"))?;
            Ok(Uploader::new(Arc::new(backend), parent))
        },
        #[cfg(not(feature = "s3"))]
        BackendConfig::S3 { .. } => Err(miette!("this build has no S3 support; rebuild with the `s3` feature")),
    }
}
