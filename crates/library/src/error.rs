//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The source path is missing or not a directory. Nothing was touched.
    #[display("not a valid source directory: {}", _0.display())]
    InvalidInput(#[error(not(source))] PathBuf),
    /// The source directory could not be walked.
    #[display("could not discover files")]
    Discovery,
    /// A partition name could not be rendered from the naming template.
    #[display("issue with partition naming template")]
    Template,
    /// Applying the plan to the filesystem failed (see the error tree).
    #[display("could not organize files")]
    Organize,
    /// The report file could not be written.
    #[display("could not write report: {}", _0.display())]
    Report(#[error(not(source))] PathBuf),
    /// A partition could not be archived; its upload is skipped.
    #[display("could not archive {}", _0.display())]
    Archive(#[error(not(source))] PathBuf),
    /// No session could be opened with the remote; nothing was uploaded.
    #[display("could not authenticate with remote storage")]
    Auth,
    /// A remote operation failed; remaining uploads were stopped.
    #[display("upload failed")]
    Upload,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Archive(_) | Self::Upload | Self::Auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::InvalidInput(PathBuf::from("/videos")), false)]
    #[case(ErrorKind::Template, false)]
    #[case(ErrorKind::Organize, false)]
    #[case(ErrorKind::Archive(PathBuf::from("/videos/Holiday_1_1Files")), true)]
    #[case(ErrorKind::Auth, true)]
    #[case(ErrorKind::Upload, true)]
    fn test_is_retryable(#[case] kind: ErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_retryable(), expected);
    }
}
