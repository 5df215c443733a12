//! Human-friendly byte sizes (`20 GiB`, `500MB`, `1073741824`).

use serde::de::{self, Deserializer, Unexpected, Visitor};
use std::fmt::{Formatter, Result as FmtResult};
use std::num::NonZeroU64;

const UNITS: &[(&str, u64)] = &[
    ("b", 1),
    ("kb", 1_000),
    ("mb", 1_000_000),
    ("gb", 1_000_000_000),
    ("tb", 1_000_000_000_000),
    ("kib", 1 << 10),
    ("mib", 1 << 20),
    ("gib", 1 << 30),
    ("tib", 1 << 40),
];

/// Parses a byte count with an optional unit suffix. Decimal units (`KB`,
/// `MB`, ...) are powers of 1000, binary units (`KiB`, `MiB`, ...) powers of
/// 1024. Fractions are allowed (`1.5GiB`) and rounded down to whole bytes.
pub fn parse_size(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    let split = trimmed.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let unit = unit.trim().to_ascii_lowercase();
    let multiplier = if unit.is_empty() {
        1
    } else {
        UNITS.iter().find(|(name, _)| *name == unit)?.1
    };
    if let Ok(whole) = number.parse::<u64>() {
        return whole.checked_mul(multiplier);
    }
    let fraction: f64 = number.parse().ok()?;
    let bytes = fraction * multiplier as f64;
    (bytes.is_finite() && bytes >= 0.0 && bytes < u64::MAX as f64).then_some(bytes as u64)
}

/// Deserializes a non-zero byte size from an integer or a unit string.
pub(crate) fn deserialize_capacity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NonZeroU64, D::Error> {
    struct CapacityVisitor;
    impl Visitor<'_> for CapacityVisitor {
        type Value = NonZeroU64;

        fn expecting(&self, f: &mut Formatter) -> FmtResult {
            f.write_str("a positive byte count such as 21474836480 or \"20 GiB\"")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            NonZeroU64::new(v).ok_or_else(|| E::invalid_value(Unexpected::Unsigned(v), &self))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u64::try_from(v)
                .ok()
                .and_then(NonZeroU64::new)
                .ok_or_else(|| E::invalid_value(Unexpected::Signed(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            parse_size(v)
                .and_then(NonZeroU64::new)
                .ok_or_else(|| E::invalid_value(Unexpected::Str(v), &self))
        }
    }
    deserializer.deserialize_any(CapacityVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0", Some(0))]
    #[case("1024", Some(1024))]
    #[case("20 GiB", Some(20 * (1 << 30)))]
    #[case("20GiB", Some(20 * (1 << 30)))]
    #[case("20gb", Some(20_000_000_000))]
    #[case(" 500 MB ", Some(500_000_000))]
    #[case("1.5KiB", Some(1536))]
    #[case("1TiB", Some(1 << 40))]
    #[case("12 B", Some(12))]
    #[case("", None)]
    #[case("GiB", None)]
    #[case("20 parsecs", None)]
    #[case("-1", None)]
    #[case("99999999999 TiB", None)]
    fn test_parse_size(#[case] input: &str, #[case] expected: Option<u64>) {
        assert_eq!(parse_size(input), expected);
    }
}
