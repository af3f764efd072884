//! Process cache resolver
//!
//! Turns a `pid_tgid` into a [`ProcessContext`] by walking the two cache
//! levels. Every miss is a normal outcome (cold cache, or an event racing
//! ahead of cache population) and simply leaves the matching field unset.

use crate::entries::{PidCache, ProcCache};
use crate::event::ProcessContext;
use crate::host::Host;
use crate::maps::CacheMaps;

/// Context plus the image entry it was resolved from, if any
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Resolved {
    pub context: ProcessContext,
    pub image: Option<ProcCache>,
}

/// Split `pid_tgid` into `(tgid, tid)`
#[inline(always)]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn split_pid_tgid(pid_tgid: u64) -> (u32, u32) {
    ((pid_tgid >> 32) as u32, pid_tgid as u32)
}

#[inline(always)]
pub fn get_pid_cache<M: CacheMaps>(maps: &M, tgid: u32) -> Option<PidCache> {
    maps.pid_cache(tgid)
}

/// Image entry for `cookie`; a zero cookie never reaches the table
#[inline(always)]
pub fn get_proc_from_cookie<M: CacheMaps>(maps: &M, cookie: u64) -> Option<ProcCache> {
    if cookie == 0 {
        return None;
    }

    maps.proc_cache(cookie)
}

/// Image entry of the thread group `tgid`
#[inline(always)]
pub fn get_proc_cache<M: CacheMaps>(maps: &M, tgid: u32) -> Option<ProcCache> {
    let pid_entry = get_pid_cache(maps, tgid)?;
    get_proc_from_cookie(maps, pid_entry.cookie)
}

/// Fill `data` for `pid_tgid`, returning the resolved image entry
///
/// Fields whose lookup misses are left as they were, so callers should hand
/// in a zeroed context.
#[inline(always)]
pub fn fill_process_context_with_pid_tgid<M: CacheMaps>(
    maps: &M,
    data: &mut ProcessContext,
    pid_tgid: u64,
) -> Option<ProcCache> {
    let (tgid, tid) = split_pid_tgid(pid_tgid);
    data.pid = tgid;
    data.tid = tid;

    if let Some(netns) = maps.netns(tid) {
        data.netns = netns;
    }

    // ignored pids are kernel housekeeping workers
    if maps.is_pid_ignored(tgid) {
        data.is_kworker = 1;
    }

    let pc = get_proc_cache(maps, tgid);
    if let Some(pc) = &pc {
        data.inode = pc.entry.executable.path_key.ino;
    }

    pc
}

/// Fill `data` for the current execution context
#[inline(always)]
pub fn fill_process_context<M: CacheMaps, H: Host>(
    maps: &M,
    host: &H,
    data: &mut ProcessContext,
) -> Option<ProcCache> {
    fill_process_context_with_pid_tgid(maps, data, host.current_pid_tgid())
}

/// Resolve `pid_tgid` into a fresh context
#[must_use]
pub fn resolve<M: CacheMaps>(maps: &M, pid_tgid: u64) -> Resolved {
    let mut context = ProcessContext::default();
    let image = fill_process_context_with_pid_tgid(maps, &mut context, pid_tgid);
    Resolved { context, image }
}
