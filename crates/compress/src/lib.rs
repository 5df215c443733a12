//! Directory archiving for finished partitions.
//!
//! This crate turns a partition directory into a single zip archive sitting
//! next to it, providing:
//!
//! - **Entry compression** selected through the [`Compression`] enum, parsed
//!   from configuration strings ([`FromStr`](std::str::FromStr)).
//! - **Streaming** archive creation via [`Archiver::compress`], copying one
//!   member file at a time so multi-gigabyte videos are never buffered.
//! - **Progress** reporting as a fraction of total input bytes through a
//!   caller-supplied callback receiving [`Progress`].
//!
//! Stored and Deflate are always available. Bzip2 and Zstd are behind
//! feature flags. Output is deterministic: entries are written in path order
//! with fixed timestamps and permissions, so the same directory contents
//! always produce the same archive bytes.

mod archive;
mod construct;
pub mod error;
mod util;

pub use crate::archive::{ARCHIVE_EXTENSION, Archiver, Progress};

/// A supported zip entry compression method.
///
/// Variants gated behind feature flags (`bzip2`, `zstd`) are only available
/// when the corresponding feature is enabled. Defaults to
/// [`Deflate`](Self::Deflate), matching what most unzip tools expect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// No compression; members are copied as-is
    Stored,
    /// Deflate compression
    #[default]
    Deflate,
    /// Bzip2 compression
    #[cfg(feature = "bzip2")]
    Bzip2,
    /// Zstd compression
    #[cfg(feature = "zstd")]
    Zstd,
}

#[cfg(test)]
mod tests {
    use crate::Compression;

    #[test]
    fn compression_default() {
        assert_eq!(Compression::default(), Compression::Deflate);
    }
}
