//! The unit grammar of operator-facing values.
//!
//! Periods and sizes are written either as a bare non-negative integer
//! (seconds / bytes) or as digits followed by a single suffix character.
//! Period suffixes are `m`, `h` and `d`; size suffixes are the binary
//! `K`, `M` and `G`.

use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use bytesize::ByteSize;
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer};

static OLDEST: Lazy<SystemTime> = Lazy::new(|| {
    humantime::parse_rfc3339("2000-01-01T00:00:00Z").expect("sentinel timestamp is well-formed")
});

/// Timestamp ranking below every recorded event, used for "never happened"
/// bookkeeping entries.
pub fn oldest_time() -> SystemTime {
    *OLDEST
}

fn split_suffix(s: &str) -> Result<(u64, Option<char>)> {
    let s = s.trim();
    if s.starts_with('-') {
        bail!("negative value: {s:?}");
    }
    match s.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => {
            let digits = &s[..s.len() - c.len_utf8()];
            let n = digits.parse().with_context(|| format!("bad number in {s:?}"))?;
            Ok((n, Some(c)))
        }
        _ => {
            let n = s.parse().with_context(|| format!("bad number {s:?}"))?;
            Ok((n, None))
        }
    }
}

/// Parses a period such as `30m`, `6h` or `1d`. A bare integer is seconds.
pub fn parse_period(s: &str) -> Result<Duration> {
    let (n, suffix) = split_suffix(s)?;
    let unit = match suffix {
        None => 1,
        Some('m') => 60,
        Some('h') => 3600,
        Some('d') => 86400,
        Some(c) => bail!("unknown period suffix {c:?} in {s:?}"),
    };
    let secs = n
        .checked_mul(unit)
        .with_context(|| format!("period {s:?} overflows"))?;
    Ok(Duration::from_secs(secs))
}

/// Parses a size such as `512K`, `10M` or `1G`. A bare integer is bytes.
pub fn parse_size(s: &str) -> Result<ByteSize> {
    let (n, suffix) = split_suffix(s)?;
    let unit = match suffix {
        None => 1,
        Some('K') => 1 << 10,
        Some('M') => 1 << 20,
        Some('G') => 1 << 30,
        Some(c) => bail!("unknown size suffix {c:?} in {s:?}"),
    };
    let bytes = n
        .checked_mul(unit)
        .with_context(|| format!("size {s:?} overflows"))?;
    Ok(ByteSize::b(bytes))
}

/// A field that YAML may carry as either an integer or a suffixed string.
#[derive(Deserialize)]
#[serde(untagged)]
enum Raw {
    Num(i64),
    Text(String),
}

pub fn de_period<'de, D>(de: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match Raw::deserialize(de)? {
        Raw::Num(n) if n < 0 => Err(serde::de::Error::custom(format!("negative period: {n}"))),
        Raw::Num(n) => Ok(Duration::from_secs(n as u64)),
        Raw::Text(s) => parse_period(&s).map_err(serde::de::Error::custom),
    }
}

pub fn de_size<'de, D>(de: D) -> Result<ByteSize, D::Error>
where
    D: Deserializer<'de>,
{
    match Raw::deserialize(de)? {
        Raw::Num(n) if n < 0 => Err(serde::de::Error::custom(format!("negative size: {n}"))),
        Raw::Num(n) => Ok(ByteSize::b(n as u64)),
        Raw::Text(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

pub fn de_opt_size<'de, D>(de: D) -> Result<Option<ByteSize>, D::Error>
where
    D: Deserializer<'de>,
{
    de_size(de).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periods() {
        assert_eq!(parse_period("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_period("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_period("6h").unwrap(), Duration::from_secs(6 * 3600));
        assert_eq!(parse_period("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(parse_period("0m").unwrap(), Duration::ZERO);
    }

    #[test]
    fn bad_periods() {
        assert!(parse_period("1s").is_err());
        assert!(parse_period("-5m").is_err());
        assert!(parse_period("m").is_err());
        assert!(parse_period("1dd").is_err());
        assert!(parse_period("").is_err());
    }

    #[test]
    fn sizes() {
        assert_eq!(parse_size("4096").unwrap(), ByteSize::b(4096));
        assert_eq!(parse_size("512K").unwrap(), ByteSize::b(512 << 10));
        assert_eq!(parse_size("10M").unwrap(), ByteSize::b(10 << 20));
        assert_eq!(parse_size("1G").unwrap(), ByteSize::b(1 << 30));
    }

    #[test]
    fn bad_sizes() {
        // the size grammar is upper-case only
        assert!(parse_size("1k").is_err());
        assert!(parse_size("1T").is_err());
        assert!(parse_size("-1G").is_err());
    }

    #[test]
    fn oldest_time_is_stable() {
        assert_eq!(oldest_time(), oldest_time());
        assert!(oldest_time() < SystemTime::now());
    }
}
