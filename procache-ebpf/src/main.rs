//! # eBPF Kernel-Side Process Cache
//!
//! Keeps the two-level process cache up to date from scheduler tracepoints
//! and resolves the current execution context into a process identity.
//!
//! ## Programs
//!
//! - **Tracepoint**: `sched_process_fork` - child inherits the parent's cache entry
//! - **Tracepoint**: `sched_process_exec` - fresh cookie and image entry
//! - **Tracepoint**: `sched_process_exit` - entry removed, image released
//!
//! Every hook also consults `KILL_LIST` for a pending signal on the current pid.
//!
//! ## Maps (Shared with Userspace)
//!
//! - `PID_CACHE` - tgid → `PidCache`
//! - `PROC_CACHE` - cookie → `ProcCache`
//! - `COOKIE_REFS` - cookie → number of thread groups referencing it
//! - `NETNS_CACHE` - tid → network namespace inode (filled by network hooks)
//! - `PID_IGNORED` - pids of kernel housekeeping workers (filled by userspace)
//! - `KILL_LIST` - pid → `PendingSignal` (filled by userspace)
//! - `EXEC_ARGS` - tid → exec argument/environment buffer ids
//! - `OFFSETS` - runtime-resolved kernel structure offsets (filled by userspace)
//! - `FEATURES` - feature flags probed by userspace
//! - `PROCESS_EVENT_GEN` - event buffer pool
//!
//! ## Build
//!
//! Always compiled in release mode (debug includes incompatible formatting code):
//! ```bash
//! cargo xtask build-ebpf
//! ```

#![no_std]
#![no_main]
#![allow(unused_unsafe)]

use aya_ebpf::{
    helpers::{
        bpf_get_current_comm, bpf_get_current_pid_tgid, bpf_get_current_task,
        bpf_get_prandom_u32, bpf_ktime_get_ns, bpf_probe_read_kernel, bpf_send_signal,
    },
    macros::{map, tracepoint},
    maps::{Array, HashMap},
    programs::TracePointContext,
};
use aya_log_ebpf::debug;
use bytemuck::AnyBitPattern;
use procache_common::{
    event_pool::{fill_args_envs, fill_process_event, new_process_event},
    exe::get_exe_inode_from_task_struct,
    lifecycle::{handle_exec, handle_exit, handle_fork, is_current_kworker_dying},
    namespace::get_namespace_nr_from_task_struct,
    resolver::split_pid_tgid,
    signal::send_signal,
    CacheMaps, CacheWriter, EventSlots, ExecSyscall, Host, KernelMemory, KernelOffsets,
    PendingSignal, PidCache, ProcCache, ProcessEvent, SignalDispatch, SignalQueue,
    EVENT_GEN_SIZE, EVENT_KIND_EXEC, EVENT_KIND_EXIT, EVENT_KIND_FORK, FEATURE_EVENT_POOL_SIZE,
    FEATURE_SEND_SIGNAL,
    TASK_COMM_LEN,
};

// ============================================================================
// Constants
// ============================================================================

/// Field offsets from `/sys/kernel/debug/tracing/events/sched/*/format`
const FORK_CHILD_PID_OFFSET: usize = 44;

const CACHE_ENTRIES: u32 = 16384;

// ============================================================================
// eBPF Maps - Shared data structures between kernel and userspace
// ============================================================================

#[map]
static PID_CACHE: HashMap<u32, PidCache> = HashMap::with_max_entries(CACHE_ENTRIES, 0);

#[map]
static PROC_CACHE: HashMap<u64, ProcCache> = HashMap::with_max_entries(CACHE_ENTRIES, 0);

#[map]
static COOKIE_REFS: HashMap<u64, u32> = HashMap::with_max_entries(CACHE_ENTRIES, 0);

#[map]
static NETNS_CACHE: HashMap<u32, u32> = HashMap::with_max_entries(CACHE_ENTRIES, 0);

#[map]
static PID_IGNORED: HashMap<u32, u32> = HashMap::with_max_entries(1024, 0);

#[map]
static KILL_LIST: HashMap<u32, PendingSignal> = HashMap::with_max_entries(1024, 0);

#[map]
static EXEC_ARGS: HashMap<u32, ExecSyscall> = HashMap::with_max_entries(1024, 0);

#[map]
static OFFSETS: Array<KernelOffsets> = Array::with_max_entries(1, 0);

#[map]
static FEATURES: Array<u32> = Array::with_max_entries(8, 0);

#[map]
static PROCESS_EVENT_GEN: Array<ProcessEvent> = Array::with_max_entries(EVENT_GEN_SIZE, 0);

// ============================================================================
// Cache seams on top of BPF maps and helpers
// ============================================================================

struct EbpfMaps;

impl CacheMaps for EbpfMaps {
    fn pid_cache(&self, tgid: u32) -> Option<PidCache> {
        unsafe { PID_CACHE.get(&tgid).copied() }
    }

    fn proc_cache(&self, cookie: u64) -> Option<ProcCache> {
        unsafe { PROC_CACHE.get(&cookie).copied() }
    }

    fn netns(&self, tid: u32) -> Option<u32> {
        unsafe { NETNS_CACHE.get(&tid).copied() }
    }

    fn is_pid_ignored(&self, pid: u32) -> bool {
        unsafe { PID_IGNORED.get(&pid).is_some() }
    }
}

impl CacheWriter for EbpfMaps {
    fn put_pid_cache(&self, tgid: u32, entry: &PidCache) -> bool {
        PID_CACHE.insert(&tgid, entry, 0).is_ok()
    }

    fn put_proc_cache(&self, cookie: u64, entry: &ProcCache) -> bool {
        PROC_CACHE.insert(&cookie, entry, 0).is_ok()
    }

    fn delete_pid_cache(&self, tgid: u32) {
        let _ = PID_CACHE.remove(&tgid);
    }

    fn delete_proc_cache(&self, cookie: u64) {
        let _ = PROC_CACHE.remove(&cookie);
    }

    // Not atomic across CPUs: a lost update leaves an image cached a little
    // longer or drops it a little early, both of which resolve as a miss.
    fn acquire_cookie(&self, cookie: u64) {
        match COOKIE_REFS.get_ptr_mut(&cookie) {
            Some(refs) => unsafe { *refs = (*refs).saturating_add(1) },
            None => {
                let _ = COOKIE_REFS.insert(&cookie, &1, 0);
            }
        }
    }

    fn release_cookie(&self, cookie: u64) -> u32 {
        let Some(refs) = COOKIE_REFS.get_ptr_mut(&cookie) else {
            return 0;
        };

        let remaining = unsafe { (*refs).saturating_sub(1) };
        if remaining == 0 {
            let _ = COOKIE_REFS.remove(&cookie);
        } else {
            unsafe { *refs = remaining };
        }
        remaining
    }
}

impl SignalQueue for EbpfMaps {
    fn pending_signal(&self, pid: u32) -> Option<PendingSignal> {
        unsafe { KILL_LIST.get(&pid).copied() }
    }

    fn delete_pending_signal(&self, pid: u32) {
        let _ = KILL_LIST.remove(&pid);
    }
}

struct EventGen;

impl EventSlots for EventGen {
    type Slot<'a> = &'a mut ProcessEvent;

    fn capacity(&self) -> u32 {
        match FEATURES.get(FEATURE_EVENT_POOL_SIZE) {
            Some(&size) if size != 0 => size,
            _ => EVENT_GEN_SIZE,
        }
    }

    fn slot(&self, index: u32) -> Option<&mut ProcessEvent> {
        PROCESS_EVENT_GEN.get_ptr_mut(index).map(|evt| unsafe { &mut *evt })
    }
}

struct EbpfHost;

impl Host for EbpfHost {
    fn current_pid_tgid(&self) -> u64 {
        unsafe { bpf_get_current_pid_tgid() }
    }

    fn current_comm(&self) -> [u8; TASK_COMM_LEN] {
        bpf_get_current_comm().unwrap_or([0; TASK_COMM_LEN])
    }

    fn send_signal_available(&self) -> bool {
        FEATURES.get(FEATURE_SEND_SIGNAL).is_some_and(|flag| *flag != 0)
    }

    fn send_signal(&self, signal: u32) {
        unsafe {
            bpf_send_signal(signal);
        }
    }

    fn new_cookie(&self) -> u64 {
        let hi = u64::from(unsafe { bpf_get_prandom_u32() });
        let lo = u64::from(unsafe { bpf_get_prandom_u32() });
        match (hi << 32) | lo {
            0 => 1,
            cookie => cookie,
        }
    }

    fn now_ns(&self) -> u64 {
        unsafe { bpf_ktime_get_ns() }
    }
}

struct KernelProbe;

impl KernelMemory for KernelProbe {
    fn read<T: AnyBitPattern>(&self, addr: u64) -> Option<T> {
        unsafe { bpf_probe_read_kernel(addr as *const T).ok() }
    }
}

fn load_offsets() -> KernelOffsets {
    OFFSETS.get(KernelOffsets::MAP_INDEX).copied().unwrap_or_default()
}

fn pid_tgid_of(tgid: u32) -> u64 {
    (u64::from(tgid) << 32) | u64::from(tgid)
}

fn dispatch_pending_signal(ctx: &TracePointContext, pid: u32) {
    if let SignalDispatch::Delivered(signal) = send_signal(&EbpfMaps, &EbpfHost, pid) {
        debug!(ctx, "Sending signal {} to pid {}", signal, pid);
    }
}

// ============================================================================
// eBPF Program Hooks
// ============================================================================

/// Hook: sched/sched_process_fork
#[tracepoint]
pub fn sched_process_fork(ctx: TracePointContext) -> u32 {
    match try_sched_process_fork(&ctx) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn try_sched_process_fork(ctx: &TracePointContext) -> Result<(), i64> {
    // the tracepoint's parent_pid is the forking thread; the cache and the
    // kill list are keyed by its thread group
    let current = EbpfHost.current_pid_tgid();
    let (parent_tgid, _) = split_pid_tgid(current);
    let child_pid = unsafe { ctx.read_at::<i32>(FORK_CHILD_PID_OFFSET)? } as u32;
    let now = EbpfHost.now_ns();

    // Threads get an entry keyed by their own id; it goes away when that
    // same id exits.
    if handle_fork(&EbpfMaps, parent_tgid, child_pid, now).is_some() {
        if let Some(evt) = new_process_event(&EventGen, current, true) {
            fill_process_event(&EbpfMaps, evt, pid_tgid_of(child_pid), EVENT_KIND_FORK, now);
        }
    }

    dispatch_pending_signal(ctx, parent_tgid);
    Ok(())
}

/// Hook: sched/sched_process_exec
#[tracepoint]
pub fn sched_process_exec(ctx: TracePointContext) -> u32 {
    match try_sched_process_exec(&ctx) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn try_sched_process_exec(ctx: &TracePointContext) -> Result<(), i64> {
    let host = EbpfHost;
    let pid_tgid = host.current_pid_tgid();
    let (tgid, tid) = split_pid_tgid(pid_tgid);
    let now = host.now_ns();

    let offsets = load_offsets();
    let task = unsafe { bpf_get_current_task() };

    let mut image = ProcCache::default();
    image.entry.executable.path_key.ino =
        get_exe_inode_from_task_struct(&KernelProbe, &offsets, task);
    image.entry.comm = host.current_comm();

    if handle_exec(&EbpfMaps, &host, tgid, &image, now).is_some() {
        if let Some(evt) = new_process_event(&EventGen, pid_tgid, false) {
            fill_process_event(&EbpfMaps, evt, pid_tgid, EVENT_KIND_EXEC, now);
            evt.ns_pid = get_namespace_nr_from_task_struct(&KernelProbe, &offsets, task);

            if let Some(syscall) = unsafe { EXEC_ARGS.get(&tid) } {
                fill_args_envs(evt, syscall);
            }
        }
    }
    let _ = EXEC_ARGS.remove(&tid);

    dispatch_pending_signal(ctx, tgid);
    Ok(())
}

/// Hook: sched/sched_process_exit
#[tracepoint]
pub fn sched_process_exit(ctx: TracePointContext) -> u32 {
    match try_sched_process_exit(&ctx) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn try_sched_process_exit(ctx: &TracePointContext) -> Result<(), i64> {
    let host = EbpfHost;
    if is_current_kworker_dying(&host) {
        return Ok(());
    }

    let pid_tgid = host.current_pid_tgid();
    let (tgid, tid) = split_pid_tgid(pid_tgid);
    let now = host.now_ns();

    // resolve before the entry is dropped, the event carries the final state
    if let Some(evt) = new_process_event(&EventGen, pid_tgid, false) {
        fill_process_event(&EbpfMaps, evt, pid_tgid, EVENT_KIND_EXIT, now);
        if let Some(last) = handle_exit(&EbpfMaps, tid, now) {
            if tid == tgid {
                evt.pid_entry.exit_timestamp = last.exit_timestamp;
            }
        }
    } else {
        handle_exit(&EbpfMaps, tid, now);
    }

    dispatch_pending_signal(ctx, tgid);
    Ok(())
}

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
