//! Per-lookup and per-event records

use bytemuck::Zeroable;

use crate::entries::{PidCache, ProcCache};

/// Result of resolving an execution context
///
/// Ephemeral: lives for the duration of the triggering event's handling and
/// is never persisted. Zero means "unknown" for `netns` and `inode`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable)]
pub struct ProcessContext {
    /// Thread group id (upper half of `pid_tgid`)
    pub pid: u32,
    /// Thread id (lower half of `pid_tgid`)
    pub tid: u32,
    /// Network namespace inode, 0 when not cached
    pub netns: u32,
    /// 1 when the pid is in `PID_IGNORED` (kernel housekeeping worker)
    pub is_kworker: u32,
    /// Executable inode, 0 when the image entry could not be resolved
    pub inode: u64,
}

impl ProcessContext {
    #[must_use]
    pub const fn is_kworker(&self) -> bool {
        self.is_kworker != 0
    }
}

/// Common header of every event
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable)]
pub struct EventHeader {
    pub kind: u32,
    /// `EVENT_FLAGS_*` bits
    pub flags: u32,
    pub timestamp: u64,
}

/// Reference to an exec argument or environment buffer
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable)]
pub struct ExecBufferRef {
    pub id: u32,
    /// Non-zero when the buffer did not fit
    pub truncated: u32,
}

/// State carried from `execve` entry to the exec event
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable)]
pub struct ExecSyscall {
    pub args: ExecBufferRef,
    pub envs: ExecBufferRef,
}

/// Process lifecycle event record, one per pool slot
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable)]
pub struct ProcessEvent {
    pub event: EventHeader,
    pub process: ProcessContext,
    pub proc_entry: ProcCache,
    pub pid_entry: PidCache,
    pub args_id: u32,
    pub envs_id: u32,
    pub args_truncated: u32,
    pub envs_truncated: u32,
    /// Pid as seen from the process's own pid namespace
    pub ns_pid: u32,
    #[allow(clippy::pub_underscore_fields)]
    pub _padding: u32,
}
