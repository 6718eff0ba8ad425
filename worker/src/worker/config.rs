//! Configuration for the walb maintenance worker.
//!
//! A configuration names the local archive, the retention window for applies,
//! the merge pacing, and the peer archives receiving replications. Periods
//! are written with `m`/`h`/`d` suffixes and sizes with binary `K`/`M`/`G`
//! suffixes; a bare integer means seconds or bytes. The `walbc_path` binary
//! is what the executor invokes to carry out a selected task; the worker only
//! checks that it exists.
//!
//! Unknown keys are rejected at every level, as are missing required keys.

//! ```rust
//! # use walb_worker::worker::config::Config;
//! # let yaml = "
//! general:
//!   addr: 192.0.2.10
//!   port: 10000
//!   walbc_path: /bin/true
//!   max_concurrent_tasks: 2
//! apply:
//!   keep_period: 14d
//! merge:
//!   interval: 1h
//!   max_nr: 10
//!   max_size: 1G
//!   threshold_nr: 5
//! repl_servers:
//!   backup1:
//!     addr: 192.0.2.20
//!     port: 10000
//!     interval: 3h
//!     compress: snappy:3:2
//!     max_merge_size: 500M
//!     bulk_size: 64K
//! # ";
//! # serde_yaml::from_str::<Config>(yaml).unwrap();
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use bytesize::ByteSize;
use serde::{Deserialize, Serialize};

use walb_worker_core::error::{ResultExt, SystemError, TypedResult};
use walb_worker_core::repl::ReplTarget;
use walb_worker_core::units::{de_opt_size, de_period};

/// Main configuration of the worker
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub general: General,

    pub apply: ApplyConfig,

    pub merge: MergeConfig,

    /// Peer archives receiving replications, keyed by target name
    pub repl_servers: BTreeMap<String, ReplTarget>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct General {
    /// Host of the local archive
    pub addr: String,

    /// Port of the local archive
    pub port: u16,

    /// Control binary the executor runs tasks with
    pub walbc_path: PathBuf,

    /// How many tasks the executor may run at once; not consumed by the
    /// selection policy
    pub max_concurrent_tasks: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ApplyConfig {
    /// Minimum age of a restorable point before it may be applied
    ///
    /// Restorable points younger than this stay available for restores.
    #[serde(
        deserialize_with = "de_period",
        serialize_with = "humantime_serde::serialize"
    )]
    pub keep_period: Duration,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Per-volume cool-down between merges issued outside the forced path
    #[serde(
        deserialize_with = "de_period",
        serialize_with = "humantime_serde::serialize"
    )]
    pub interval: Duration,

    /// Advisory cap on the number of diffs per merge
    #[serde(default)]
    pub max_nr: Option<u64>,

    /// Advisory cap on the merged byte size
    #[serde(default, deserialize_with = "de_opt_size")]
    pub max_size: Option<ByteSize>,

    /// Diff count at which a volume is merged regardless of pacing
    pub threshold_nr: usize,
}

impl Config {
    /// Reads, deserializes and validates a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> TypedResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))
            .typ(SystemError::Config)?;
        let mut cfg: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("cannot parse config {}", path.display()))
            .typ(SystemError::Config)?;
        for (name, target) in &mut cfg.repl_servers {
            target.name = name.clone();
        }
        cfg.validate().typ(SystemError::Config)?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.general.port == 0 {
            bail!("general.port must be in 1..=65535");
        }
        if !self.general.walbc_path.exists() {
            bail!(
                "walbc binary {} does not exist",
                self.general.walbc_path.display()
            );
        }
        for target in self.repl_servers.values() {
            if target.port == 0 {
                bail!("repl server {} port must be in 1..=65535", target.name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;
    use walb_worker_core::repl::CompressMode;

    use super::*;

    const FULL: &str = r#"
general:
  addr: 192.0.2.10
  port: 10000
  walbc_path: WALBC
  max_concurrent_tasks: 2
apply:
  keep_period: 14d
merge:
  interval: 1h
  max_nr: 10
  max_size: 1G
  threshold_nr: 5
repl_servers:
  backup1:
    addr: 192.0.2.20
    port: 10000
    interval: 3h
    compress: snappy:3:2
    max_merge_size: 500M
    bulk_size: 64K
  backup2:
    addr: 192.0.2.21
    port: 10001
    interval: 90
"#;

    /// Writes `yaml` to a temp config file, substituting an existing
    /// binary path for the WALBC placeholder.
    fn load(yaml: &str) -> TypedResult<(Config, NamedTempFile, NamedTempFile)> {
        let walbc = NamedTempFile::new().unwrap();
        let mut file = NamedTempFile::new().unwrap();
        let yaml = yaml.replace("WALBC", &walbc.path().display().to_string());
        file.write_all(yaml.as_bytes()).unwrap();
        Config::load(file.path()).map(|cfg| (cfg, walbc, file))
    }

    #[test]
    fn full_document() {
        let (cfg, ..) = load(FULL).unwrap();
        assert_eq!(cfg.general.addr, "192.0.2.10");
        assert_eq!(cfg.general.port, 10000);
        assert_eq!(cfg.general.max_concurrent_tasks, 2);
        assert_eq!(cfg.apply.keep_period, Duration::from_secs(14 * 86400));
        assert_eq!(cfg.merge.interval, Duration::from_secs(3600));
        assert_eq!(cfg.merge.max_nr, Some(10));
        assert_eq!(cfg.merge.max_size, Some(ByteSize::b(1 << 30)));
        assert_eq!(cfg.merge.threshold_nr, 5);

        let backup1 = &cfg.repl_servers["backup1"];
        assert_eq!(backup1.name, "backup1");
        assert_eq!(backup1.interval, Duration::from_secs(3 * 3600));
        assert_eq!(backup1.compress.mode, CompressMode::Snappy);
        assert_eq!(backup1.compress.level, 3);
        assert_eq!(backup1.compress.num_cpu, 2);
        assert_eq!(backup1.max_merge_size, ByteSize::b(500 << 20));
        assert_eq!(backup1.bulk_size, ByteSize::b(64 << 10));

        // a bare integer interval is seconds, optional fields default
        let backup2 = &cfg.repl_servers["backup2"];
        assert_eq!(backup2.interval, Duration::from_secs(90));
        assert_eq!(backup2.compress.mode, CompressMode::None);
        assert_eq!(backup2.max_merge_size, ByteSize::b(0));
    }

    #[test]
    fn optional_merge_keys_default() {
        let yaml = FULL
            .replace("  max_nr: 10\n", "")
            .replace("  max_size: 1G\n", "");
        let (cfg, ..) = load(&yaml).unwrap();
        assert_eq!(cfg.merge.max_nr, None);
        assert_eq!(cfg.merge.max_size, None);
    }

    #[test]
    fn empty_peer_map_is_allowed() {
        let yaml = FULL.split("repl_servers:").next().unwrap().to_string() + "repl_servers: {}\n";
        let (cfg, ..) = load(&yaml).unwrap();
        assert!(cfg.repl_servers.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        for (from, to) in [
            ("apply:", "apply:\n  retention: 3d"),
            ("general:", "extra_section: {}\ngeneral:"),
            ("    interval: 3h", "    interval: 3h\n    nice_level: 10"),
        ] {
            let yaml = FULL.replace(from, to);
            let err = load(&yaml).unwrap_err();
            assert_eq!(err.err(), SystemError::Config, "{from:?}");
        }
    }

    #[test]
    fn missing_required_keys_are_rejected() {
        for key in ["  addr: 192.0.2.10\n", "  threshold_nr: 5\n", "  keep_period: 14d\n"] {
            let yaml = FULL.replace(key, "");
            assert!(load(&yaml).is_err(), "{key:?}");
        }
    }

    #[test]
    fn bad_units_are_rejected() {
        for (from, to) in [
            ("keep_period: 14d", "keep_period: 14w"),
            ("keep_period: 14d", "keep_period: -7d"),
            ("max_size: 1G", "max_size: 1T"),
            ("compress: snappy:3:2", "compress: zip:3:2"),
            ("compress: snappy:3:2", "compress: snappy:12:2"),
        ] {
            let yaml = FULL.replace(from, to);
            let err = load(&yaml).unwrap_err();
            assert_eq!(err.err(), SystemError::Config, "{to:?}");
        }
    }

    #[test]
    fn ports_are_bounded() {
        for (from, to) in [
            ("port: 10000\n  walbc_path", "port: 0\n  walbc_path"),
            ("port: 10000\n  walbc_path", "port: 70000\n  walbc_path"),
            ("port: 10001", "port: 0"),
        ] {
            let yaml = FULL.replace(from, to);
            assert!(load(&yaml).is_err(), "{to:?}");
        }
    }

    #[test]
    fn walbc_path_must_exist() {
        let yaml = FULL.replace("WALBC", "/nonexistent/walbc");
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert_eq!(err.err(), SystemError::Config);
    }
}
