//! One-shot signal dispatcher
//!
//! The control plane writes `(pid, signal)` into `KILL_LIST`; the first hook
//! that fires for that pid delivers the signal to the current execution
//! context and deletes the request. At most once: the entry is removed right
//! after delivery is requested, whatever the kernel does with it.
//!
//! A pid alone cannot tell "same process" from "recycled pid". Requests that
//! carry a cookie are checked against the pid's current `PidCache` entry and
//! dropped without delivery when it no longer matches. Requests without a
//! cookie accept that race.

use crate::host::Host;
use crate::maps::{CacheMaps, SignalQueue};

/// Outcome of a dispatch attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalDispatch {
    /// `bpf_send_signal` is not usable here
    Unavailable,
    /// No request (or a zero signal) for the pid
    NotPending,
    /// The request targeted another process instance and was discarded
    Stale,
    /// The signal was handed to the kernel and the request consumed
    Delivered(u32),
}

#[inline(always)]
pub fn send_signal<Q, H>(queue: &Q, host: &H, pid: u32) -> SignalDispatch
where
    Q: SignalQueue + CacheMaps,
    H: Host,
{
    if !host.send_signal_available() {
        return SignalDispatch::Unavailable;
    }

    let Some(pending) = queue.pending_signal(pid) else {
        return SignalDispatch::NotPending;
    };
    if pending.signal == 0 {
        return SignalDispatch::NotPending;
    }

    if pending.cookie != 0 {
        let current = queue.pid_cache(pid).map_or(0, |entry| entry.cookie);
        if current != pending.cookie {
            queue.delete_pending_signal(pid);
            return SignalDispatch::Stale;
        }
    }

    host.send_signal(pending.signal);
    queue.delete_pending_signal(pid);

    SignalDispatch::Delivered(pending.signal)
}
