use crate::Compression;
use crate::error::{Error, ErrorKind};
use std::str::FromStr;

impl FromStr for Compression {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "store" | "stored" => Ok(Compression::Stored),
            "deflate" | "deflated" | "zip" => Ok(Compression::Deflate),
            #[cfg(feature = "bzip2")]
            "bz2" | "bzip2" => Ok(Compression::Bzip2),
            #[cfg(not(feature = "bzip2"))]
            "bz2" | "bzip2" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            #[cfg(feature = "zstd")]
            "zst" | "zstd" => Ok(Compression::Zstd),
            #[cfg(not(feature = "zstd"))]
            "zst" | "zstd" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use crate::error::ErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case("none", Compression::Stored)]
    #[case("stored", Compression::Stored)]
    #[case("STORE", Compression::Stored)]
    #[case("deflate", Compression::Deflate)]
    #[case(" Deflate ", Compression::Deflate)]
    #[case("zip", Compression::Deflate)]
    #[cfg_attr(feature = "bzip2", case("bz2", Compression::Bzip2))]
    #[cfg_attr(feature = "bzip2", case("bzip2", Compression::Bzip2))]
    #[cfg_attr(feature = "zstd", case("zst", Compression::Zstd))]
    #[cfg_attr(feature = "zstd", case("zstd", Compression::Zstd))]
    fn test_from_str(#[case] test: &str, #[case] expected: Compression) {
        assert_eq!(test.parse::<Compression>().unwrap(), expected);
    }

    #[rstest]
    #[case("invalid")]
    #[case("gzip")]
    #[case(" ")]
    fn test_from_str_invalid(#[case] test: &str) {
        let err = test.parse::<Compression>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[cfg(not(feature = "zstd"))]
    #[test]
    fn test_from_str_disabled() {
        let err = "zstd".parse::<Compression>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::DisabledFormat(_)));
    }
}
