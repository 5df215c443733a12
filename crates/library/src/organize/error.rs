//! Error types for the [`organize`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An organize error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for organize operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies an organize failure.
///
/// ### Per-file
/// - [`ErrorKind::Move`]: the file stays where it was; the run continues.
///
/// ### Per-partition
/// - [`ErrorKind::Staging`]: no staging directory; none of the partition's
///   files were moved.
/// - [`ErrorKind::Template`]: the partition name could not be rendered; its
///   files stay in the staging directory.
/// - [`ErrorKind::Conflict`]: the final name is already taken; its files
///   stay in the staging directory.
/// - [`ErrorKind::Rename`]: renaming the staging directory failed.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not move {}", _0.display())]
    Move(#[error(not(source))] PathBuf),
    #[display("could not prepare staging directory {}", _0.display())]
    Staging(#[error(not(source))] PathBuf),
    #[display("could not name partition {_0}")]
    Template(#[error(not(source))] usize),
    #[display("{} already exists", _0.display())]
    Conflict(#[error(not(source))] PathBuf),
    #[display("could not rename staging directory to {}", _0.display())]
    Rename(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Move(_) | Self::Rename(_))
    }
}
