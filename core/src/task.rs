//! The unit of maintenance work the scheduler hands to the executor.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gid::Gid;
use crate::repl::ReplTarget;
use crate::server::ServerRef;

/// One selected maintenance action on one volume.
///
/// Equality is structural; the `Display` form is stable and is what the
/// driver prints for the executor.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Task {
    /// Collapse diffs into the base image up to `gid`.
    Apply {
        ax: ServerRef,
        vol: String,
        gid: Gid,
    },
    /// Replace the diff run `[gid_b, gid_e]` by a single equivalent diff.
    Merge {
        ax: ServerRef,
        vol: String,
        gid_b: Gid,
        gid_e: Gid,
    },
    /// Push recent diffs for `vol` from `src` to the peer archive `dst`.
    Repl {
        vol: String,
        src: ServerRef,
        dst: ReplTarget,
    },
}

impl Task {
    pub fn vol(&self) -> &str {
        match self {
            Task::Apply { vol, .. } | Task::Merge { vol, .. } | Task::Repl { vol, .. } => vol,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Apply { ax, vol, gid } => write!(f, "apply ax={ax} vol={vol} gid={gid}"),
            Task::Merge {
                ax,
                vol,
                gid_b,
                gid_e,
            } => write!(f, "merge ax={ax} vol={vol} gidB={gid_b} gidE={gid_e}"),
            Task::Repl { vol, src, dst } => write!(f, "repl vol={vol} src={src} dst={dst}"),
        }
    }
}
