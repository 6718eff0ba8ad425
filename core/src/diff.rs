//! Differential snapshots and the pure analysis the scheduler runs on them.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use anyhow::{bail, Context};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::gid::{Gid, GidInfo, GidRange};

/// One incremental diff covering the gid interval `[b.gid_b, e.gid_b]`.
///
/// `is_comp_diff` marks a compacted diff acting as a merge boundary;
/// `is_mergeable` is the per-diff permission flag. The text form is
/// `|…|-->|…| <flags> <size>` where the flags are `M`/`-` (mergeable)
/// followed by `C`/`-` (compacted).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Diff {
    pub b: GidRange,
    pub e: GidRange,
    pub data_size: u64,
    pub is_comp_diff: bool,
    pub is_mergeable: bool,
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-->{} {}{} {}",
            self.b,
            self.e,
            if self.is_mergeable { 'M' } else { '-' },
            if self.is_comp_diff { 'C' } else { '-' },
            self.data_size
        )
    }
}

impl FromStr for Diff {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split_whitespace();
        let (Some(range), Some(flags), Some(size), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            bail!("diff {s:?} is not `<range> <flags> <size>`");
        };
        let (b, e) = range
            .split_once("-->")
            .with_context(|| format!("diff range {range:?} lacks `-->`"))?;
        let flags: Vec<char> = flags.chars().collect();
        let (is_mergeable, is_comp_diff) = match flags[..] {
            [m @ ('M' | '-'), c @ ('C' | '-')] => (m == 'M', c == 'C'),
            _ => bail!("bad diff flags in {s:?}"),
        };
        Ok(Self {
            b: b.parse()?,
            e: e.parse()?,
            data_size: size.parse().with_context(|| format!("bad size in {s:?}"))?,
            is_comp_diff,
            is_mergeable,
        })
    }
}

/// Latest restorable point taken at or before `time`.
///
/// The first list entry is the current base point and never a candidate, so
/// the scan starts at index 1. The list is ordered by timestamp ascending.
pub fn latest_gid_info_before(time: SystemTime, infos: &[GidInfo]) -> Option<&GidInfo> {
    infos.iter().skip(1).take_while(|info| info.ts <= time).last()
}

pub fn sum_diff_size(diffs: &[Diff]) -> u64 {
    diffs.iter().map(|d| d.data_size).sum()
}

/// Picks the gid range whose diffs are cheapest to merge.
///
/// The diff list is cut into maximal runs at every compacted or unmergeable
/// diff; the breaking diff begins the next run. Runs shorter than two diffs
/// are discarded. Among the survivors the run with the smallest average size
/// wins (merge overhead amortizes best over many small diffs), first-seen on
/// ties. Returns the winning run's outer gid boundaries.
pub fn merge_gid_range(diffs: &[Diff]) -> Option<(Gid, Gid)> {
    let mut runs: Vec<&[Diff]> = Vec::new();
    let mut start = 0;
    for (i, diff) in diffs.iter().enumerate() {
        if diff.is_comp_diff || !diff.is_mergeable {
            if i - start >= 2 {
                runs.push(&diffs[start..i]);
            }
            start = i;
        }
    }
    if diffs.len() - start >= 2 {
        runs.push(&diffs[start..]);
    }

    runs.into_iter()
        .min_by_key(|run| sum_diff_size(run) / run.len() as u64)
        .map(|run| (run[0].b.gid_b, run[run.len() - 1].e.gid_b))
}

/// Checks that an applicable diff list makes progress and is contiguous.
pub fn verify_applicable_chain(diffs: &[Diff]) -> anyhow::Result<()> {
    for diff in diffs {
        if diff.b.gid_b >= diff.e.gid_b {
            bail!("diff {diff} does not advance its gid");
        }
    }
    for (prev, next) in diffs.iter().tuple_windows() {
        if next.b.gid_b != prev.e.gid_b {
            bail!("diff chain breaks between {prev} and {next}");
        }
    }
    Ok(())
}
