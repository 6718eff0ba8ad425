//! Archive queries through the walbc control binary.
//!
//! Every query spawns the configured binary against one server and parses
//! its line-oriented standard output with the text forms of the core types.
//! Process-level failures surface as transport errors; payloads that do not
//! parse surface as invariant violations.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use walb_worker_core::archive::{ArchiveClient, ArchiveState, BaseState};
use walb_worker_core::diff::Diff;
use walb_worker_core::error::{ResultExt, SystemError, TypedResult};
use walb_worker_core::gid::{Gid, GidInfo};
use walb_worker_core::server::ServerRef;

use crate::problem;

/// Deadline handed to walbc for each query.
const QUERY_TIMEOUT: Duration = Duration::from_secs(60);

pub struct WalbcClient {
    path: PathBuf,
    timeout: Duration,
}

impl WalbcClient {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            timeout: QUERY_TIMEOUT,
        }
    }

    /// Full argument list for one query against `server`.
    fn query_args(&self, server: &ServerRef, args: &[&str]) -> Vec<String> {
        let mut v = vec![
            "-a".to_string(),
            server.addr.clone(),
            "-p".to_string(),
            server.port.to_string(),
            "-to".to_string(),
            self.timeout.as_secs().to_string(),
        ];
        v.extend(args.iter().map(|s| s.to_string()));
        v
    }

    fn query(&self, server: &ServerRef, args: &[&str]) -> TypedResult<String> {
        let output = Command::new(&self.path)
            .args(self.query_args(server, args))
            .output()
            .with_context(|| format!("cannot run {}", self.path.display()))
            .typ(SystemError::Transport)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            problem!(
                Transport,
                "walbc {args:?} against {server} failed ({}): {}",
                output.status,
                stderr.trim()
            );
        }
        String::from_utf8(output.stdout)
            .context("walbc wrote non-utf8 output")
            .typ(SystemError::Transport)
    }

    fn parse_lines<T>(text: &str) -> TypedResult<Vec<T>>
    where
        T: FromStr,
        T::Err: Into<anyhow::Error>,
    {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.parse().typ(SystemError::Invariant))
            .collect()
    }

    fn parse_one<T>(text: &str) -> TypedResult<T>
    where
        T: FromStr,
        T::Err: Into<anyhow::Error>,
    {
        text.trim().parse().typ(SystemError::Invariant)
    }
}

impl ArchiveClient for WalbcClient {
    fn vol_list(&self, ax: &ServerRef) -> TypedResult<Vec<String>> {
        Ok(self
            .query(ax, &["get", "vol-list"])?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    fn base_state(&self, ax: &ServerRef, vol: &str) -> TypedResult<BaseState> {
        Self::parse_one(&self.query(ax, &["get", "base", vol])?)
    }

    fn restorable(&self, ax: &ServerRef, vol: &str) -> TypedResult<Vec<GidInfo>> {
        Self::parse_lines(&self.query(ax, &["get", "restorable", vol, "all"])?)
    }

    fn total_diff_size(&self, ax: &ServerRef, vol: &str, gid1: Gid) -> TypedResult<u64> {
        let gid1 = gid1.to_string();
        Self::parse_one(&self.query(ax, &["get", "total-diff-size", vol, &gid1])?)
    }

    fn num_diff(&self, ax: &ServerRef, vol: &str) -> TypedResult<usize> {
        Self::parse_one(&self.query(ax, &["get", "num-diff", vol])?)
    }

    fn applicable_diff_list(&self, ax: &ServerRef, vol: &str) -> TypedResult<Vec<Diff>> {
        Self::parse_lines(&self.query(ax, &["get", "applicable-diff", vol])?)
    }

    fn state(&self, ax: &ServerRef, vol: &str) -> TypedResult<ArchiveState> {
        Self::parse_one(&self.query(ax, &["get", "state", vol])?)
    }
}
