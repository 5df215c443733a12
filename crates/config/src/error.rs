//! Configuration Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A source could not be read or parsed (bad TOML, wrong value type).
    #[display("could not load configuration: {_0}")]
    Load(#[error(not(source))] String),
    /// A value parsed but is not acceptable.
    #[display("invalid configuration value for `{key}`: {reason}")]
    Invalid {
        #[error(not(source))]
        key: &'static str,
        #[error(not(source))]
        reason: String,
    },
}

impl ErrorKind {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid { key, reason: reason.into() }
    }

    /// Configuration never fixes itself.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            ErrorKind::invalid("capacity", "must be greater than zero").to_string(),
            "invalid configuration value for `capacity`: must be greater than zero"
        );
        assert!(!ErrorKind::Load("bad toml".to_string()).is_retryable());
    }
}
