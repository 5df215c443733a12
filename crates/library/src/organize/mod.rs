//! Applying a [`Plan`](crate::Plan) to the filesystem.
//!
//! Each planned partition is filled in a hidden staging directory under the
//! source root and renamed to its final name once every file has been moved,
//! so a half-filled partition never appears under its final name.
//!
//! The primary entry point is [`organize`], which streams
//! [`OrganizeEvent`]s. Per-file and per-partition failures are yielded as
//! `Err` items without ending the stream; nothing that already happened is
//! rolled back.

mod conflict;
pub mod error;
mod stream;

pub use self::stream::{OrganizeEvent, Partition, organize};

/// Name prefix of staging directories. Discovery never descends into them.
pub const STAGING_PREFIX: &str = ".vidsplit-staging-";
