//! # Process Cache Engine
//!
//! Runs the shared cache helpers from `procache-common` on top of the
//! userspace [`CacheStore`], [`EventPool`] and a [`Host`]. The eBPF program
//! calls the very same helpers from its tracepoints; this facade is what
//! tests, tooling and the `simulate` command drive.
//!
//! ## Operations
//!
//! - [`ProcessCache::resolve_current()`] / [`ProcessCache::resolve()`] - pid_tgid to context
//! - [`ProcessCache::fork()`] / [`ProcessCache::fork_current()`], [`ProcessCache::exec()`], [`ProcessCache::exit()`] - cache lifecycle
//! - [`ProcessCache::new_event()`] / [`ProcessCache::record_event()`] - event pool
//! - [`ProcessCache::dispatch_signal()`] - one-shot signal delivery
//! - [`ProcessCache::namespace_nr()`] / [`ProcessCache::root_nr()`] - pid namespace walk

use log::{debug, trace};
use parking_lot::MutexGuard;
use procache_common::event_pool::fill_process_event;
use procache_common::lifecycle::{handle_exec, handle_exit, handle_fork, is_current_kworker_dying};
use procache_common::namespace::{get_namespace_nr_from_task_struct, get_root_nr_from_task_struct};
use procache_common::resolver::{
    fill_process_context, get_proc_from_cookie, resolve, split_pid_tgid,
};
use procache_common::signal::send_signal;
use procache_common::{
    CacheMaps, Host, KernelMemory, KernelOffsets, ProcCache, ProcessContext, ProcessEvent,
    Resolved, SignalDispatch, EVENT_KIND_EXEC, EVENT_KIND_EXIT, EVENT_KIND_FORK,
};

use crate::domain::types::pid_tgid;
use crate::domain::{Cookie, Pid, Tid};
use crate::host::SimulatedHost;
use crate::pool::EventPool;
use crate::settings::Settings;
use crate::store::CacheStore;
use crate::summary::ProcessSummary;

pub struct ProcessCache<H: Host = SimulatedHost> {
    store: CacheStore,
    pool: EventPool,
    host: H,
    offsets: KernelOffsets,
}

impl<H: Host> ProcessCache<H> {
    #[must_use]
    pub fn new(settings: &Settings, offsets: KernelOffsets, host: H) -> Self {
        Self {
            store: CacheStore::with_capacity(settings.table_capacity),
            pool: EventPool::new(settings.event_pool_size),
            host,
            offsets,
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn pool(&self) -> &EventPool {
        &self.pool
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn offsets(&self) -> &KernelOffsets {
        &self.offsets
    }

    /// Resolve the current execution context
    pub fn resolve_current(&self) -> Resolved {
        let mut context = ProcessContext::default();
        let image = fill_process_context(&self.store, &self.host, &mut context);
        Resolved { context, image }
    }

    pub fn resolve(&self, pid_tgid: u64) -> Resolved {
        resolve(&self.store, pid_tgid)
    }

    /// Zeroed event record for the current execution context
    pub fn new_event(&self, is_fork: bool) -> Option<MutexGuard<'_, ProcessEvent>> {
        self.pool.acquire(self.host.current_pid_tgid(), is_fork)
    }

    /// Event record for the current execution context, filled from the cache
    pub fn record_event(&self, kind: u32) -> Option<MutexGuard<'_, ProcessEvent>> {
        self.pool.record(&self.store, self.host.current_pid_tgid(), kind, self.host.now_ns())
    }

    /// Deliver the pending signal for `pid`, if any, to the current context
    pub fn dispatch_signal(&self, pid: Pid) -> SignalDispatch {
        let outcome = send_signal(&self.store, &self.host, pid.0);
        if let SignalDispatch::Delivered(signal) = outcome {
            debug!("signal {signal} delivered to {pid}");
        }
        outcome
    }

    /// `child` was forked from `parent`
    ///
    /// Returns the fork event, or `None` when the child could not be cached
    /// or no event slot was available.
    pub fn fork(&self, parent: Pid, child: Pid) -> Option<ProcessEvent> {
        let now = self.host.now_ns();
        let entry = handle_fork(&self.store, parent.0, child.0, now)?;
        trace!("fork {parent} -> {child} {}", Cookie(entry.cookie));

        // slot of the forking context, identity of the child's main thread
        let mut evt = self.new_event(true)?;
        fill_process_event(&self.store, &mut evt, pid_tgid(child, Tid(child.0)), EVENT_KIND_FORK, now);
        Some(*evt)
    }

    /// The current context forked `child`, as the fork tracepoint sees it
    ///
    /// The forking thread may not lead its group: the parent is always the
    /// current thread group, which also receives any signal pending for it.
    pub fn fork_current(&self, child: Pid) -> (Option<ProcessEvent>, SignalDispatch) {
        let (tgid, _) = split_pid_tgid(self.host.current_pid_tgid());
        let event = self.fork(Pid(tgid), child);
        (event, self.dispatch_signal(Pid(tgid)))
    }

    /// The current thread group replaced its image with `image`
    ///
    /// Returns the new cookie, or `None` when the cache is full.
    pub fn exec(&self, image: &ProcCache) -> Option<(Cookie, Option<ProcessEvent>)> {
        let (tgid, _) = split_pid_tgid(self.host.current_pid_tgid());
        let now = self.host.now_ns();
        let cookie = Cookie(handle_exec(&self.store, &self.host, tgid, image, now)?);
        trace!("exec {} {cookie}", Pid(tgid));

        let event = self.record_event(EVENT_KIND_EXEC).map(|evt| *evt);
        Some((cookie, event))
    }

    /// The current thread group exited
    ///
    /// Dying kernel workers are skipped. Returns the exit event with the
    /// exit timestamp set, or `None` if the thread group was not cached.
    pub fn exit(&self) -> Option<ProcessEvent> {
        if is_current_kworker_dying(&self.host) {
            return None;
        }

        let mut event = self.record_event(EVENT_KIND_EXIT).map(|evt| *evt);
        let (tgid, _) = split_pid_tgid(self.host.current_pid_tgid());
        let last = handle_exit(&self.store, tgid, self.host.now_ns())?;
        trace!("exit {}", Pid(tgid));

        if let Some(evt) = &mut event {
            evt.pid_entry.exit_timestamp = last.exit_timestamp;
        }
        event
    }

    /// Pid of `task` as seen from its own (innermost) namespace
    pub fn namespace_nr<K: KernelMemory>(&self, mem: &K, task: u64) -> u32 {
        get_namespace_nr_from_task_struct(mem, &self.offsets, task)
    }

    /// Pid of `task` in the root namespace
    pub fn root_nr<K: KernelMemory>(&self, mem: &K, task: u64) -> u32 {
        get_root_nr_from_task_struct(mem, &self.offsets, task)
    }

    pub fn summary(&self, pid: Pid) -> Option<ProcessSummary> {
        let entry = self.store.pid_cache(pid.0)?;
        let image = get_proc_from_cookie(&self.store, entry.cookie);
        Some(ProcessSummary::new(pid, &entry, image.as_ref()))
    }
}
