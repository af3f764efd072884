//! Cache table seams
//!
//! Every operation touches exactly one key of one table. Implementations
//! give per-key atomicity and nothing more: there are no cross-key
//! transactions, so a `PidCache` may point at a cookie whose `ProcCache`
//! has already been removed by a concurrent exit.

use core::ops::DerefMut;

use crate::entries::{PendingSignal, PidCache, ProcCache};
use crate::event::ProcessEvent;

/// Read side of the cache tables
pub trait CacheMaps {
    /// `PID_CACHE` lookup by tgid
    fn pid_cache(&self, tgid: u32) -> Option<PidCache>;

    /// `PROC_CACHE` lookup by cookie
    fn proc_cache(&self, cookie: u64) -> Option<ProcCache>;

    /// `NETNS_CACHE` lookup by tid
    fn netns(&self, tid: u32) -> Option<u32>;

    /// `PID_IGNORED` membership
    fn is_pid_ignored(&self, pid: u32) -> bool;
}

/// Write side, used by the fork/exec/exit handlers
///
/// Inserts report `false` when the table is full. Deletes are no-ops on
/// missing keys.
pub trait CacheWriter: CacheMaps {
    fn put_pid_cache(&self, tgid: u32, entry: &PidCache) -> bool;

    fn put_proc_cache(&self, cookie: u64, entry: &ProcCache) -> bool;

    fn delete_pid_cache(&self, tgid: u32);

    fn delete_proc_cache(&self, cookie: u64);

    /// Record one more thread group referencing `cookie`
    fn acquire_cookie(&self, cookie: u64);

    /// Drop one reference to `cookie`, returning how many remain
    fn release_cookie(&self, cookie: u64) -> u32;
}

/// One-shot signal requests keyed by pid
pub trait SignalQueue {
    fn pending_signal(&self, pid: u32) -> Option<PendingSignal>;

    fn delete_pending_signal(&self, pid: u32);
}

/// Fixed set of pre-allocated event records
pub trait EventSlots {
    /// Exclusive access to one record for the duration of the borrow
    type Slot<'a>: DerefMut<Target = ProcessEvent>
    where
        Self: 'a;

    /// Number of slots, fixed at configuration time
    fn capacity(&self) -> u32;

    /// Slot at `index`, `None` when it cannot be obtained
    fn slot(&self, index: u32) -> Option<Self::Slot<'_>>;
}
