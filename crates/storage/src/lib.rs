//! Remote storage for finished archives.
//!
//! The [`RemoteStorage`] trait is the seam between the pipeline and whatever
//! service receives the archives. An [`Uploader`] wraps a backend together
//! with the configured parent container and hands out an authenticated
//! [`UploadSession`] for creating containers and uploading files.
//!
//! Credentials live behind the [`CredentialStore`] trait and are resolved by
//! an [`Authenticator`], which falls back to an interactive [`ConsentFlow`]
//! when nothing usable is stored.

pub mod auth;
pub mod backend;
pub mod credentials;
pub mod error;
mod models;
mod path;
mod uploader;

pub use crate::auth::{Authenticator, ConsentFlow, PromptConsent};
pub use crate::backend::RemoteStorage;
pub use crate::credentials::{CredentialStore, Credentials};
pub use crate::models::{ContainerId, RemoteId, Session};
pub use crate::path::{available_path, validate as validate_path, validate_name};
pub use crate::uploader::{UploadSession, Uploader};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn RemoteStorage + Send + Sync>;
