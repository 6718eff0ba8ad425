//! Replication peers as the operator configures them.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use bytesize::ByteSize;
use serde::{Deserialize, Serialize, Serializer};

use crate::server::ServerRef;
use crate::units::{de_period, de_size};

/// One peer archive receiving replications.
///
/// `compress`, `max_merge_size` and `bulk_size` are advisory for the
/// executor; the policy only consumes `interval`. The target's `name` is the
/// key it is configured under, filled in after deserialization.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ReplTarget {
    #[serde(skip)]
    pub name: String,
    pub addr: String,
    pub port: u16,
    #[serde(
        deserialize_with = "de_period",
        serialize_with = "humantime_serde::serialize"
    )]
    pub interval: Duration,
    #[serde(default, deserialize_with = "de_compress")]
    pub compress: CompressOpt,
    #[serde(default, deserialize_with = "de_size")]
    pub max_merge_size: ByteSize,
    #[serde(default, deserialize_with = "de_size")]
    pub bulk_size: ByteSize,
}

impl ReplTarget {
    pub fn to_server_ref(&self) -> ServerRef {
        ServerRef::archive(&self.name, &self.addr, self.port)
    }
}

impl fmt::Display for ReplTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressMode {
    #[default]
    None,
    Snappy,
    Gzip,
    Lzma,
}

impl fmt::Display for CompressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompressMode::None => "none",
            CompressMode::Snappy => "snappy",
            CompressMode::Gzip => "gzip",
            CompressMode::Lzma => "lzma",
        })
    }
}

impl FromStr for CompressMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "none" => CompressMode::None,
            "snappy" => CompressMode::Snappy,
            "gzip" => CompressMode::Gzip,
            "lzma" => CompressMode::Lzma,
            _ => bail!("unknown compress mode {s:?}"),
        })
    }
}

/// Compression directive `MODE:LEVEL:NUM_CPU`; trailing fields may be
/// omitted and default to `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressOpt {
    pub mode: CompressMode,
    pub level: u8,
    pub num_cpu: u32,
}

impl fmt::Display for CompressOpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.mode, self.level, self.num_cpu)
    }
}

impl FromStr for CompressOpt {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(':').collect();
        if fields.len() > 3 {
            bail!("compress option {s:?} has more than three fields");
        }
        let mut opt = CompressOpt::default();
        if let Some(mode) = fields.first() {
            opt.mode = mode.parse()?;
        }
        if let Some(level) = fields.get(1) {
            opt.level = level
                .parse()
                .with_context(|| format!("bad compress level in {s:?}"))?;
            if opt.level > 9 {
                bail!("compress level {} out of range 0..=9", opt.level);
            }
        }
        if let Some(num_cpu) = fields.get(2) {
            opt.num_cpu = num_cpu
                .parse()
                .with_context(|| format!("bad compress cpu count in {s:?}"))?;
        }
        Ok(opt)
    }
}

impl Serialize for CompressOpt {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

fn de_compress<'de, D>(de: D) -> Result<CompressOpt, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(de)?
        .parse::<CompressOpt>()
        .map_err(serde::de::Error::custom)
}
