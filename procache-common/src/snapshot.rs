//! Field-scoped copies of cache entries
//!
//! Never whole-structure copies: destination buffers may live in event
//! records with different layout guarantees, the tty name is only copied
//! when present, and the exit timestamp must not cross a fork/exec boundary.

use crate::entries::{ContainerContext, PidCache, ProcCache, ProcessEntry};
use crate::TTY_NAME_LEN;

/// Copy a tty name, returning the number of bytes copied
///
/// An empty source (first byte NUL) leaves `dst` untouched and returns 0.
#[inline(always)]
#[allow(clippy::cast_possible_truncation)]
pub fn copy_tty_name(src: &[u8; TTY_NAME_LEN], dst: &mut [u8; TTY_NAME_LEN]) -> u32 {
    if src[0] == 0 {
        return 0;
    }

    *dst = *src;
    TTY_NAME_LEN as u32
}

#[inline(always)]
pub fn copy_proc_entry(src: &ProcessEntry, dst: &mut ProcessEntry) {
    dst.executable = src.executable;
    dst.exec_timestamp = src.exec_timestamp;
    copy_tty_name(&src.tty_name, &mut dst.tty_name);
    // fixed TASK_COMM_LEN bound, the source is never read past it
    dst.comm = src.comm;
}

#[inline(always)]
pub fn copy_proc_cache(src: &ProcCache, dst: &mut ProcCache) {
    ContainerContext::copy_container_id(&src.container.container_id, &mut dst.container.container_id);
    dst.container.cgroup_flags = src.container.cgroup_flags;
    copy_proc_entry(&src.entry, &mut dst.entry);
}

/// Copy thread group state across a fork/exec boundary
///
/// `exit_timestamp` is never copied; a live process must not read as exited.
#[inline(always)]
pub fn copy_pid_cache_except_exit_ts(src: &PidCache, dst: &mut PidCache) {
    dst.cookie = src.cookie;
    dst.user_session_id = src.user_session_id;
    dst.ppid = src.ppid;
    dst.fork_timestamp = src.fork_timestamp;
    dst.credentials = src.credentials;
}
