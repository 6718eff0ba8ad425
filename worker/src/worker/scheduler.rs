//! Task selection for archive maintenance.
//!
//! The worker surveys every volume of the local archive and picks at most
//! one task per pass, in a fixed priority order: applies already in flight
//! are drained first, then the largest reclaimable apply backlog, then
//! merges forced by diff count, then due replications, and finally
//! opportunistic merges for volumes past their cool-down. The executor
//! feeds completions back through [Worker::note_repl_done] and
//! [Worker::note_merge_issued].

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

use anyhow::anyhow;

use walb_worker_core::archive::ArchiveClient;
use walb_worker_core::diff::{latest_gid_info_before, merge_gid_range, verify_applicable_chain};
use walb_worker_core::error::{ResultExt, SystemError, TypedResult};
use walb_worker_core::gid::Gid;
use walb_worker_core::repl::ReplTarget;
use walb_worker_core::server::{ServerLayout, ServerRef};
use walb_worker_core::task::Task;
use walb_worker_core::units::oldest_time;

use super::config::Config;

/// The policy engine. Lives for the whole worker process; everything it
/// knows beyond the configuration is re-queried on every pass, except the
/// two completion tables.
pub struct Worker<C> {
    cfg: Config,
    a0: ServerRef,
    layout: ServerLayout,
    client: C,
    /// Completion time of the last successful replication per (vol, peer)
    done_repl: Mutex<HashMap<(String, String), SystemTime>>,
    /// Issue time of the last merge per volume
    merge_last: Mutex<HashMap<String, SystemTime>>,
}

impl<C: ArchiveClient> Worker<C> {
    pub fn new(cfg: Config, client: C) -> Self {
        let a0 = ServerRef::archive("a0", &cfg.general.addr, cfg.general.port);
        Self {
            layout: ServerLayout::around_archive(a0.clone()),
            a0,
            cfg,
            client,
            done_repl: Mutex::default(),
            merge_last: Mutex::default(),
        }
    }

    pub fn layout(&self) -> &ServerLayout {
        &self.layout
    }

    /// Records a finished replication. Called by the executor.
    pub fn note_repl_done(&self, vol: &str, target: &str, ts: SystemTime) {
        self.done_repl
            .lock()
            .unwrap()
            .insert((vol.to_string(), target.to_string()), ts);
    }

    /// Records an issued merge. Called by the executor.
    pub fn note_merge_issued(&self, vol: &str, ts: SystemTime) {
        self.merge_last.lock().unwrap().insert(vol.to_string(), ts);
    }

    /// Surveys all volumes and selects at most one maintenance task.
    pub fn select_task(&self) -> TypedResult<Option<Task>> {
        self.select_task_at(SystemTime::now())
    }

    fn select_task_at(&self, now: SystemTime) -> TypedResult<Option<Task>> {
        let vols = self.client.vol_list(&self.a0)?;
        debug!("surveying {} volumes", vols.len());

        if let Some(task) = self.resume_apply(&vols)? {
            return Ok(Some(task));
        }
        if let Some(task) = self.apply_largest_backlog(&vols, now)? {
            return Ok(Some(task));
        }
        let num_diffs = self.num_diffs(&vols)?;
        if let Some(task) = self.forced_merge(&vols, &num_diffs)? {
            return Ok(Some(task));
        }
        if let Some(task) = self.due_repl(&vols, now)? {
            return Ok(Some(task));
        }
        self.opportunistic_merge(&vols, &num_diffs, now)
    }

    /// An apply left mid-flight preempts all new work; the chain must be
    /// drained before anything else touches it.
    fn resume_apply(&self, vols: &[String]) -> TypedResult<Option<Task>> {
        for vol in vols {
            let base = self.client.base_state(&self.a0, vol)?;
            if base.is_applying() {
                debug!("{vol}: apply in progress toward gid {}", base.b.gid_b);
                return Ok(Some(Task::Apply {
                    ax: self.a0.clone(),
                    vol: vol.clone(),
                    gid: base.b.gid_b,
                }));
            }
        }
        Ok(None)
    }

    /// Applies the volume with the most reclaimable bytes, using the latest
    /// restorable point that has aged past the retention window.
    fn apply_largest_backlog(
        &self,
        vols: &[String],
        now: SystemTime,
    ) -> TypedResult<Option<Task>> {
        let Some(cutoff) = now.checked_sub(self.cfg.apply.keep_period) else {
            return Ok(None);
        };
        let mut best: Option<(u64, &String, Gid)> = None;
        for vol in vols {
            let infos = self.client.restorable(&self.a0, vol)?;
            if infos.windows(2).any(|w| w[0].ts > w[1].ts) {
                return Err(anyhow!("restorable points of {vol} are not time-ordered"))
                    .typ(SystemError::Invariant);
            }
            let Some(info) = latest_gid_info_before(cutoff, &infos) else {
                continue;
            };
            let size = self.client.total_diff_size(&self.a0, vol, info.gid)?;
            if best.map_or(true, |(s, ..)| size >= s) {
                best = Some((size, vol, info.gid));
            }
        }
        Ok(best.map(|(size, vol, gid)| {
            debug!("{vol}: applying up to gid {gid} reclaims {size} bytes");
            Task::Apply {
                ax: self.a0.clone(),
                vol: vol.clone(),
                gid,
            }
        }))
    }

    fn num_diffs(&self, vols: &[String]) -> TypedResult<Vec<usize>> {
        vols.iter()
            .map(|vol| self.client.num_diff(&self.a0, vol))
            .collect()
    }

    /// Merges the volume carrying the most diffs among `candidates`, if its
    /// applicable diffs contain a mergeable run.
    fn merge_by_count(&self, candidates: Vec<(usize, &String)>) -> TypedResult<Option<Task>> {
        let Some((_, vol)) = candidates.into_iter().min_by_key(|&(n, _)| Reverse(n)) else {
            return Ok(None);
        };
        let diffs = self.client.applicable_diff_list(&self.a0, vol)?;
        verify_applicable_chain(&diffs).typ(SystemError::Invariant)?;
        Ok(merge_gid_range(&diffs).map(|(gid_b, gid_e)| Task::Merge {
            ax: self.a0.clone(),
            vol: vol.clone(),
            gid_b,
            gid_e,
        }))
    }

    /// A diff count at or over the threshold hurts restore latency; such
    /// volumes are merged ahead of replication.
    fn forced_merge(&self, vols: &[String], num_diffs: &[usize]) -> TypedResult<Option<Task>> {
        let candidates = vols
            .iter()
            .zip(num_diffs)
            .filter(|&(_, &n)| n >= self.cfg.merge.threshold_nr)
            .map(|(vol, &n)| (n, vol))
            .collect();
        self.merge_by_count(candidates)
    }

    /// Replicates the stalest (volume, peer) pair among those due, where
    /// both ends are in a state accepting replication. Pairs that never
    /// replicated rank oldest.
    fn due_repl(&self, vols: &[String], now: SystemTime) -> TypedResult<Option<Task>> {
        let mut candidates: Vec<(SystemTime, &String, &ReplTarget)> = Vec::new();
        for vol in vols {
            if !self.client.state(&self.a0, vol)?.accepts_repl() {
                continue;
            }
            for target in self.cfg.repl_servers.values() {
                let a1 = target.to_server_ref();
                if !self.client.state(&a1, vol)?.accepts_repl() {
                    continue;
                }
                let done = self
                    .done_repl
                    .lock()
                    .unwrap()
                    .get(&(vol.clone(), target.name.clone()))
                    .copied();
                if let Some(ts) = done {
                    if ts + target.interval > now {
                        // not yet due
                        continue;
                    }
                }
                candidates.push((done.unwrap_or_else(oldest_time), vol, target));
            }
        }
        Ok(candidates
            .into_iter()
            .min_by_key(|&(ts, ..)| ts)
            .map(|(_, vol, target)| Task::Repl {
                vol: vol.clone(),
                src: self.a0.clone(),
                dst: target.clone(),
            }))
    }

    /// Keeps fragmentation low during quiet periods: volumes past their
    /// merge cool-down compete by diff count.
    fn opportunistic_merge(
        &self,
        vols: &[String],
        num_diffs: &[usize],
        now: SystemTime,
    ) -> TypedResult<Option<Task>> {
        let merge_last = self.merge_last.lock().unwrap();
        let candidates = vols
            .iter()
            .zip(num_diffs)
            .filter(|&(vol, _)| match merge_last.get(vol.as_str()) {
                Some(&ts) => ts + self.cfg.merge.interval <= now,
                None => true,
            })
            .map(|(vol, &n)| (n, vol))
            .collect();
        drop(merge_last);
        self.merge_by_count(candidates)
    }
}
