//! Generation identifiers and restorable points.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// Position on a volume's diff chain. Monotonically non-decreasing over the
/// life of the volume; 0 is an ordinary value.
pub type Gid = u64;

/// A gid pair `gid_b <= gid_e`, printed `|b,e|` and collapsed to `|b|` when
/// both ends coincide.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct GidRange {
    pub gid_b: Gid,
    pub gid_e: Gid,
}

impl GidRange {
    pub fn at(gid: Gid) -> Self {
        Self {
            gid_b: gid,
            gid_e: gid,
        }
    }

    pub fn new(gid_b: Gid, gid_e: Gid) -> Self {
        Self { gid_b, gid_e }
    }
}

impl fmt::Display for GidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.gid_b == self.gid_e {
            write!(f, "|{}|", self.gid_b)
        } else {
            write!(f, "|{},{}|", self.gid_b, self.gid_e)
        }
    }
}

impl FromStr for GidRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .strip_prefix('|')
            .and_then(|s| s.strip_suffix('|'))
            .with_context(|| format!("gid range {s:?} is not |…| delimited"))?;
        let (b, e) = match inner.split_once(',') {
            Some((b, e)) => (b, e),
            None => (inner, inner),
        };
        let gid_b = b.parse().with_context(|| format!("bad gid in {s:?}"))?;
        let gid_e = e.parse().with_context(|| format!("bad gid in {s:?}"))?;
        if gid_b > gid_e {
            bail!("decreasing gid range {s:?}");
        }
        Ok(Self { gid_b, gid_e })
    }
}

/// A restorable point: the gid and the wall-clock time it was taken.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct GidInfo {
    pub gid: Gid,
    pub ts: SystemTime,
}

impl fmt::Display for GidInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.gid, humantime::format_rfc3339_seconds(self.ts))
    }
}

impl FromStr for GidInfo {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split_whitespace();
        let (Some(gid), Some(ts), None) = (fields.next(), fields.next(), fields.next()) else {
            bail!("restorable point {s:?} is not `<gid> <timestamp>`");
        };
        Ok(Self {
            gid: gid.parse().with_context(|| format!("bad gid in {s:?}"))?,
            ts: humantime::parse_rfc3339(ts).with_context(|| format!("bad timestamp in {s:?}"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gid_range_text_form() {
        assert_eq!(GidRange::at(5).to_string(), "|5|");
        assert_eq!(GidRange::new(5, 7).to_string(), "|5,7|");
        assert_eq!("|5|".parse::<GidRange>().unwrap(), GidRange::at(5));
        assert_eq!("|5,7|".parse::<GidRange>().unwrap(), GidRange::new(5, 7));
    }

    #[test]
    fn gid_range_rejects_garbage() {
        assert!("5,7".parse::<GidRange>().is_err());
        assert!("|7,5|".parse::<GidRange>().is_err());
        assert!("|a,b|".parse::<GidRange>().is_err());
        assert!("||".parse::<GidRange>().is_err());
    }

    #[test]
    fn gid_info_text_form() {
        let info: GidInfo = "42 2025-01-01T12:00:00Z".parse().unwrap();
        assert_eq!(info.gid, 42);
        assert_eq!(info.to_string(), "42 2025-01-01T12:00:00Z");
    }

    #[test]
    fn gid_info_rejects_garbage() {
        assert!("42".parse::<GidInfo>().is_err());
        assert!("42 yesterday".parse::<GidInfo>().is_err());
        assert!("42 2025-01-01T12:00:00Z extra".parse::<GidInfo>().is_err());
    }
}
