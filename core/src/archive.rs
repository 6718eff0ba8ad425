//! The contract between the scheduler and an archive node.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::diff::Diff;
use crate::error::TypedResult;
use crate::gid::{Gid, GidInfo, GidRange};
use crate::server::ServerRef;

/// Volume state as the archive reports it.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveState {
    Clear,
    SyncReady,
    FullSync,
    HashSync,
    WdiffRecv,
    ReplSync,
    Stopped,
    Archived,
}

impl ArchiveState {
    /// Whether replication may be issued while the volume is in this state,
    /// on either end of the transfer.
    pub fn accepts_repl(&self) -> bool {
        matches!(
            self,
            ArchiveState::Archived
                | ArchiveState::HashSync
                | ArchiveState::WdiffRecv
                | ArchiveState::ReplSync
        )
    }
}

impl fmt::Display for ArchiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArchiveState::Clear => "Clear",
            ArchiveState::SyncReady => "SyncReady",
            ArchiveState::FullSync => "FullSync",
            ArchiveState::HashSync => "HashSync",
            ArchiveState::WdiffRecv => "WdiffRecv",
            ArchiveState::ReplSync => "ReplSync",
            ArchiveState::Stopped => "Stopped",
            ArchiveState::Archived => "Archived",
        })
    }
}

impl FromStr for ArchiveState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Clear" => ArchiveState::Clear,
            "SyncReady" => ArchiveState::SyncReady,
            "FullSync" => ArchiveState::FullSync,
            "HashSync" => ArchiveState::HashSync,
            "WdiffRecv" => ArchiveState::WdiffRecv,
            "ReplSync" => ArchiveState::ReplSync,
            "Stopped" => ArchiveState::Stopped,
            "Archived" => ArchiveState::Archived,
            _ => bail!("unknown archive state {s:?}"),
        })
    }
}

/// The archive's base image position.
///
/// Stable prints as `<|b|>`; a base mid-apply prints as `<|b|-->|e|>` and
/// exposes the gid the apply is driving toward through [BaseState::b].
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BaseState {
    pub b: GidRange,
    pub e: Option<GidRange>,
}

impl BaseState {
    pub fn stable(b: GidRange) -> Self {
        Self { b, e: None }
    }

    pub fn applying(b: GidRange, e: GidRange) -> Self {
        Self { b, e: Some(e) }
    }

    pub fn is_applying(&self) -> bool {
        self.e.is_some()
    }
}

impl fmt::Display for BaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.e {
            None => write!(f, "<{}>", self.b),
            Some(e) => write!(f, "<{}-->{}>", self.b, e),
        }
    }
}

impl FromStr for BaseState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .strip_prefix('<')
            .and_then(|s| s.strip_suffix('>'))
            .with_context(|| format!("base state {s:?} is not <…> delimited"))?;
        match inner.split_once("-->") {
            None => Ok(Self::stable(inner.parse()?)),
            Some((b, e)) => Ok(Self::applying(b.parse()?, e.parse()?)),
        }
    }
}

/// Queries the scheduler issues against archive nodes.
///
/// This is the only seam through which the policy touches the outside world;
/// tests substitute an in-memory fake. Every method may fail with a
/// transport-level error.
pub trait ArchiveClient {
    /// Names of all volumes the archive holds.
    fn vol_list(&self, ax: &ServerRef) -> TypedResult<Vec<String>>;

    fn base_state(&self, ax: &ServerRef, vol: &str) -> TypedResult<BaseState>;

    /// All restorable points, ordered by timestamp ascending. The first
    /// entry is the current base point.
    fn restorable(&self, ax: &ServerRef, vol: &str) -> TypedResult<Vec<GidInfo>>;

    /// Bytes that collapse into the base image when applied up to `gid1`.
    fn total_diff_size(&self, ax: &ServerRef, vol: &str, gid1: Gid) -> TypedResult<u64>;

    fn num_diff(&self, ax: &ServerRef, vol: &str) -> TypedResult<usize>;

    /// The volume's applicable diffs, ordered by `b.gid_b` ascending.
    fn applicable_diff_list(&self, ax: &ServerRef, vol: &str) -> TypedResult<Vec<Diff>>;

    fn state(&self, ax: &ServerRef, vol: &str) -> TypedResult<ArchiveState>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_state_text_form() {
        let stable: BaseState = "<|7|>".parse().unwrap();
        assert!(!stable.is_applying());
        assert_eq!(stable.to_string(), "<|7|>");

        let applying: BaseState = "<|3,5|-->|42|>".parse().unwrap();
        assert!(applying.is_applying());
        assert_eq!(applying.b, GidRange::new(3, 5));
        assert_eq!(applying.to_string(), "<|3,5|-->|42|>");
    }

    #[test]
    fn base_state_rejects_garbage() {
        assert!("|7|".parse::<BaseState>().is_err());
        assert!("<7>".parse::<BaseState>().is_err());
        assert!("<|7|-->>".parse::<BaseState>().is_err());
    }

    #[test]
    fn archive_state_round_trips() {
        for state in [
            ArchiveState::Clear,
            ArchiveState::SyncReady,
            ArchiveState::FullSync,
            ArchiveState::HashSync,
            ArchiveState::WdiffRecv,
            ArchiveState::ReplSync,
            ArchiveState::Stopped,
            ArchiveState::Archived,
        ] {
            assert_eq!(state.to_string().parse::<ArchiveState>().unwrap(), state);
        }
        assert!("Resizing".parse::<ArchiveState>().is_err());
    }

    #[test]
    fn active_states() {
        assert!(ArchiveState::Archived.accepts_repl());
        assert!(ArchiveState::HashSync.accepts_repl());
        assert!(ArchiveState::WdiffRecv.accepts_repl());
        assert!(ArchiveState::ReplSync.accepts_repl());
        assert!(!ArchiveState::Stopped.accepts_repl());
        assert!(!ArchiveState::SyncReady.accepts_repl());
        assert!(!ArchiveState::Clear.accepts_repl());
    }
}
