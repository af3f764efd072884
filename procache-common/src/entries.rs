//! Cache entry layouts
//!
//! `PidCache` is keyed by thread group id and mutated only by the owning
//! thread group's own fork/exec/exit events. `ProcCache` is keyed by an
//! opaque cookie and shared by every thread group running the same image
//! instance.

use bytemuck::Zeroable;

use crate::{CONTAINER_ID_LEN, TASK_COMM_LEN, TTY_NAME_LEN};

/// Identity of a file on disk
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable)]
pub struct PathKey {
    /// Inode number
    pub ino: u64,
    /// Mount the inode was resolved through
    pub mount_id: u32,
    /// Generation of the path resolution that produced this key
    pub path_id: u32,
}

/// Executable file backing a process image
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable)]
pub struct FileEntry {
    pub path_key: PathKey,
    pub flags: u32,
    #[allow(clippy::pub_underscore_fields)]
    pub _padding: u32,
}

/// Credentials snapshot taken at fork/exec time
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable)]
pub struct Credentials {
    pub uid: u32,
    pub gid: u32,
    pub euid: u32,
    pub egid: u32,
    pub fsuid: u32,
    pub fsgid: u32,
    pub cap_effective: u64,
    pub cap_permitted: u64,
}

/// Container the image runs in
///
/// Filled by the container/cgroup collaborator; treated as an opaque value
/// by the cache helpers.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable)]
pub struct ContainerContext {
    pub container_id: [u8; CONTAINER_ID_LEN],
    pub cgroup_flags: u64,
}

impl Default for ContainerContext {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl ContainerContext {
    /// Copy a container id between two fixed-size buffers
    #[inline(always)]
    pub fn copy_container_id(src: &[u8; CONTAINER_ID_LEN], dst: &mut [u8; CONTAINER_ID_LEN]) {
        *dst = *src;
    }
}

/// Cached metadata about one executing binary instance
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable)]
pub struct ProcessEntry {
    pub executable: FileEntry,
    /// Timestamp of the exec that created this image (nanoseconds since boot)
    pub exec_timestamp: u64,
    /// Controlling terminal, NUL-terminated, or all zeroes when detached
    pub tty_name: [u8; TTY_NAME_LEN],
    /// Command name, NUL-terminated
    pub comm: [u8; TASK_COMM_LEN],
}

impl Default for ProcessEntry {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Image state, keyed by cookie in `PROC_CACHE`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable)]
pub struct ProcCache {
    pub container: ContainerContext,
    pub entry: ProcessEntry,
}

/// Thread group state, keyed by tgid in `PID_CACHE`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable)]
pub struct PidCache {
    /// Cookie of the `ProcCache` entry this thread group runs (0 = none yet)
    pub cookie: u64,
    pub fork_timestamp: u64,
    /// Set when the thread group terminates; never carried into a new entry
    pub exit_timestamp: u64,
    pub user_session_id: u64,
    pub credentials: Credentials,
    pub ppid: u32,
    #[allow(clippy::pub_underscore_fields)]
    pub _padding: u32,
}

/// Signal delivery request written by the control plane into `KILL_LIST`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable)]
pub struct PendingSignal {
    pub signal: u32,
    #[allow(clippy::pub_underscore_fields)]
    pub _padding: u32,
    /// Cookie of the process instance the request targets (0 = whichever
    /// process currently holds the pid)
    pub cookie: u64,
}

impl PendingSignal {
    #[must_use]
    pub const fn new(signal: u32) -> Self {
        Self { signal, _padding: 0, cookie: 0 }
    }

    #[must_use]
    pub const fn for_cookie(signal: u32, cookie: u64) -> Self {
        Self { signal, _padding: 0, cookie }
    }
}

/// Bytes of a NUL-terminated fixed-size buffer, without the terminator
#[must_use]
pub fn c_str(buf: &[u8]) -> &[u8] {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    &buf[..end]
}

/// Write `src` into `dst` as a NUL-terminated string, truncating if needed
///
/// The last byte of `dst` is always left as a terminator.
pub fn write_c_str(dst: &mut [u8], src: &[u8]) {
    dst.fill(0);
    let len = src.len().min(dst.len().saturating_sub(1));
    dst[..len].copy_from_slice(&src[..len]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_str_stops_at_nul() {
        let mut buf = [0u8; TASK_COMM_LEN];
        buf[..4].copy_from_slice(b"bash");
        assert_eq!(c_str(&buf), b"bash");
        assert_eq!(c_str(b"full"), b"full");
    }

    #[test]
    fn test_write_c_str_truncates() {
        let mut buf = [0xffu8; 8];
        write_c_str(&mut buf, b"a-very-long-name");
        assert_eq!(&buf[..7], b"a-very-");
        assert_eq!(buf[7], 0);
    }

    #[test]
    fn test_default_entries_are_zeroed() {
        let entry = ProcCache::default();
        assert!(entry.entry.tty_name.iter().all(|&b| b == 0));
        assert_eq!(entry.container.cgroup_flags, 0);
        assert_eq!(PidCache::default().cookie, 0);
    }
}
