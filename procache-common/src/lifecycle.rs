//! Cache maintenance on fork, exec and exit
//!
//! - fork: the child inherits the parent's thread group state (minus the exit
//!   timestamp) and shares its image cookie
//! - exec: a fresh cookie and image entry replace whatever the thread group
//!   ran before
//! - exit: the thread group entry goes away, and so does its image once no
//!   other thread group references the cookie
//!
//! Cookies come from [`Host::new_cookie`], never from the pid, so a recycled
//! pid can never inherit the identity of the process that held it before.

use crate::entries::{PidCache, ProcCache};
use crate::host::Host;
use crate::maps::CacheWriter;
use crate::snapshot::{copy_pid_cache_except_exit_ts, copy_proc_cache};
use crate::{KWORKER_DYING_COMM, TASK_COMM_LEN};

/// Exact literal match on the command name of a kernel worker being torn down
#[inline(always)]
#[must_use]
pub fn is_kworker_dying(comm: &[u8; TASK_COMM_LEN]) -> bool {
    comm.starts_with(KWORKER_DYING_COMM)
}

#[inline(always)]
pub fn is_current_kworker_dying<H: Host>(host: &H) -> bool {
    is_kworker_dying(&host.current_comm())
}

/// Create the child's thread group entry from its parent's
///
/// An unknown parent yields a child entry with no image (cookie 0). A stale
/// entry already held by the child pid (missed exit, recycled pid) gives up
/// its image reference. Returns the new entry, or `None` when the table is
/// full.
#[inline(always)]
pub fn handle_fork<W: CacheWriter>(
    maps: &W,
    parent_tgid: u32,
    child_tgid: u32,
    now: u64,
) -> Option<PidCache> {
    let mut child = PidCache::default();
    if let Some(parent) = maps.pid_cache(parent_tgid) {
        copy_pid_cache_except_exit_ts(&parent, &mut child);
    }
    child.ppid = parent_tgid;
    child.fork_timestamp = now;

    let stale = maps.pid_cache(child_tgid).map_or(0, |old| old.cookie);
    if !maps.put_pid_cache(child_tgid, &child) {
        return None;
    }
    if child.cookie != 0 {
        maps.acquire_cookie(child.cookie);
    }
    release_image(maps, stale);

    Some(child)
}

/// Point `tgid` at a new image entry built from `image`
///
/// Returns the new cookie, or `None` when either table is full (the cache
/// is then left as it was).
#[inline(always)]
pub fn handle_exec<W: CacheWriter, H: Host>(
    maps: &W,
    host: &H,
    tgid: u32,
    image: &ProcCache,
    now: u64,
) -> Option<u64> {
    let cookie = host.new_cookie();

    let mut entry = ProcCache::default();
    copy_proc_cache(image, &mut entry);
    entry.entry.exec_timestamp = now;
    if !maps.put_proc_cache(cookie, &entry) {
        return None;
    }

    let mut pid_entry = maps.pid_cache(tgid).unwrap_or_default();
    let previous = pid_entry.cookie;
    pid_entry.cookie = cookie;
    if !maps.put_pid_cache(tgid, &pid_entry) {
        maps.delete_proc_cache(cookie);
        return None;
    }
    maps.acquire_cookie(cookie);

    release_image(maps, previous);

    Some(cookie)
}

/// Remove `tgid` from the cache, returning its final state with the exit
/// timestamp set
#[inline(always)]
pub fn handle_exit<W: CacheWriter>(maps: &W, tgid: u32, now: u64) -> Option<PidCache> {
    let mut entry = maps.pid_cache(tgid)?;
    entry.exit_timestamp = now;

    maps.delete_pid_cache(tgid);
    release_image(maps, entry.cookie);

    Some(entry)
}

#[inline(always)]
fn release_image<W: CacheWriter>(maps: &W, cookie: u64) {
    if cookie != 0 && maps.release_cookie(cookie) == 0 {
        maps.delete_proc_cache(cookie);
    }
}
