//! # Shared Data Structures and Cache Helpers (eBPF ↔ Userspace)
//!
//! Defines the process cache layouts shared between the kernel-side eBPF
//! program and userspace, together with the allocation-free helpers that
//! resolve an execution context into a process identity. All types use
//! `#[repr(C)]` for consistent memory layout across the kernel/userspace
//! boundary.
//!
//! The helpers are generic over a handful of small traits (see [`maps`] and
//! [`host`]) so the exact same code runs inside the eBPF program, on top of
//! BPF maps and `bpf_probe_read_kernel`, and inside the userspace simulator
//! used by tests and tooling.
//!
//! ## Two-Level Cache
//!
//! ```text
//!   PID_CACHE (tgid → PidCache)          PROC_CACHE (cookie → ProcCache)
//!  ┌──────────────────────────┐         ┌──────────────────────────────┐
//!  │ cookie ──────────────────┼────────▶│ container, executable, tty,  │
//!  │ ppid, fork/exit ts, creds│         │ comm, exec timestamp         │
//!  └──────────────────────────┘         └──────────────────────────────┘
//! ```
//!
//! Thread groups that run the same image instance share one `ProcCache`
//! entry through its cookie. A cookie of zero means "no image yet".
//!
//! ## Key Types
//!
//! - [`PidCache`] - Per thread group state
//! - [`ProcCache`] - Per executable image state
//! - [`ProcessContext`] - Result of resolving an execution context
//! - [`ProcessEvent`] - Event record handed out by the event buffer pool
//! - [`KernelOffsets`] - Runtime-resolved kernel structure offsets

#![cfg_attr(not(test), no_std)]

pub mod entries;
pub mod event;
pub mod event_pool;
pub mod exe;
pub mod host;
pub mod lifecycle;
pub mod maps;
pub mod namespace;
pub mod offsets;
pub mod resolver;
pub mod signal;
pub mod snapshot;

pub use entries::{
    ContainerContext, Credentials, FileEntry, PathKey, PendingSignal, PidCache, ProcCache,
    ProcessEntry,
};
pub use event::{EventHeader, ExecBufferRef, ExecSyscall, ProcessContext, ProcessEvent};
pub use host::{Host, KernelMemory};
pub use maps::{CacheMaps, CacheWriter, EventSlots, SignalQueue};
pub use offsets::KernelOffsets;
pub use resolver::Resolved;
pub use signal::SignalDispatch;

// ============================================================================
// Layout Constants
// ============================================================================

/// Length of the kernel `comm` field (`TASK_COMM_LEN`)
pub const TASK_COMM_LEN: usize = 16;

/// Length of the cached controlling terminal name
pub const TTY_NAME_LEN: usize = 64;

/// Length of a container identifier (hex encoded sha256)
pub const CONTAINER_ID_LEN: usize = 64;

/// Default number of slots in the event buffer pool
///
/// Events are assigned a slot by `pid_tgid % EVENT_GEN_SIZE`. Two concurrent
/// events landing on the same slot overwrite each other; a larger pool lowers
/// the collision probability at the cost of memory.
pub const EVENT_GEN_SIZE: u32 = 16;

/// Event kinds stored in [`EventHeader::kind`]
pub const EVENT_KIND_FORK: u32 = 1;
pub const EVENT_KIND_EXEC: u32 = 2;
pub const EVENT_KIND_EXIT: u32 = 3;

/// Event header flag: the event is eligible for activity dump sampling
///
/// Set on every event handed out by the pool except fork events.
pub const EVENT_FLAGS_ACTIVITY_DUMP_SAMPLE: u32 = 1 << 1;

/// Command name carried by kernel workers that are being torn down
pub const KWORKER_DYING_COMM: &[u8] = b"kworker/dying";

// ============================================================================
// Map Names (shared so the loader and the eBPF program agree)
// ============================================================================

pub const MAP_PID_CACHE: &str = "PID_CACHE";
pub const MAP_PROC_CACHE: &str = "PROC_CACHE";
pub const MAP_COOKIE_REFS: &str = "COOKIE_REFS";
pub const MAP_NETNS_CACHE: &str = "NETNS_CACHE";
pub const MAP_PID_IGNORED: &str = "PID_IGNORED";
pub const MAP_KILL_LIST: &str = "KILL_LIST";
pub const MAP_EXEC_ARGS: &str = "EXEC_ARGS";
pub const MAP_PROCESS_EVENT_GEN: &str = "PROCESS_EVENT_GEN";
pub const MAP_OFFSETS: &str = "OFFSETS";
pub const MAP_FEATURES: &str = "FEATURES";

/// Index in the `FEATURES` array holding the "`bpf_send_signal` usable" flag
pub const FEATURE_SEND_SIGNAL: u32 = 0;

/// Index in the `FEATURES` array holding the loaded size of
/// `PROCESS_EVENT_GEN`; 0 means the compiled-in [`EVENT_GEN_SIZE`]
pub const FEATURE_EVENT_POOL_SIZE: u32 = 1;

#[cfg(feature = "user")]
use aya::Pod;

// These unsafe impls are required for eBPF <-> userspace communication
// Pod trait ensures types can be safely transmitted as plain bytes
#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for PidCache {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for ProcCache {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for PendingSignal {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for KernelOffsets {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for ProcessEvent {}
