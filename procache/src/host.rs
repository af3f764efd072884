//! Simulated execution context
//!
//! Stands in for the BPF helpers when the cache helpers run in userspace:
//! the "current" thread and its command name are set by the caller, signals
//! are recorded instead of delivered, cookies come from a counter and time
//! only moves when told to.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use procache_common::entries::write_c_str;
use procache_common::{Host, TASK_COMM_LEN};

use crate::domain::types::pid_tgid;
use crate::domain::{Pid, Tid};

/// A signal handed to [`Host::send_signal`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveredSignal {
    pub pid_tgid: u64,
    pub signal: u32,
}

#[derive(Debug)]
pub struct SimulatedHost {
    pid_tgid: AtomicU64,
    comm: Mutex<[u8; TASK_COMM_LEN]>,
    send_signal: AtomicBool,
    delivered: Mutex<Vec<DeliveredSignal>>,
    next_cookie: AtomicU64,
    clock: AtomicU64,
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SimulatedHost {
    #[must_use]
    pub fn new(send_signal: bool) -> Self {
        Self {
            pid_tgid: AtomicU64::new(0),
            comm: Mutex::new([0; TASK_COMM_LEN]),
            send_signal: AtomicBool::new(send_signal),
            delivered: Mutex::new(Vec::new()),
            next_cookie: AtomicU64::new(1),
            clock: AtomicU64::new(0),
        }
    }

    /// Make `(pid, tid)` the current execution context
    pub fn switch_to(&self, pid: Pid, tid: Tid) {
        self.pid_tgid.store(pid_tgid(pid, tid), Ordering::Release);
    }

    /// Set the current command name, truncated to `TASK_COMM_LEN - 1` bytes
    pub fn set_comm(&self, comm: &str) {
        let mut buf = [0; TASK_COMM_LEN];
        write_c_str(&mut buf, comm.as_bytes());
        *self.comm.lock() = buf;
    }

    pub fn set_send_signal(&self, available: bool) {
        self.send_signal.store(available, Ordering::Release);
    }

    pub fn advance(&self, ns: u64) {
        self.clock.fetch_add(ns, Ordering::AcqRel);
    }

    /// Signals requested so far, oldest first
    pub fn delivered(&self) -> Vec<DeliveredSignal> {
        self.delivered.lock().clone()
    }
}

impl Host for SimulatedHost {
    fn current_pid_tgid(&self) -> u64 {
        self.pid_tgid.load(Ordering::Acquire)
    }

    fn current_comm(&self) -> [u8; TASK_COMM_LEN] {
        *self.comm.lock()
    }

    fn send_signal_available(&self) -> bool {
        self.send_signal.load(Ordering::Acquire)
    }

    fn send_signal(&self, signal: u32) {
        let target = self.current_pid_tgid();
        self.delivered.lock().push(DeliveredSignal { pid_tgid: target, signal });
    }

    fn new_cookie(&self) -> u64 {
        self.next_cookie.fetch_add(1, Ordering::AcqRel)
    }

    fn now_ns(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procache_common::entries::c_str;

    #[test]
    fn test_cookies_are_never_zero() {
        let host = SimulatedHost::default();
        let first = host.new_cookie();
        assert_ne!(first, 0);
        assert_ne!(host.new_cookie(), first);
    }

    #[test]
    fn test_comm_truncates() {
        let host = SimulatedHost::default();
        host.set_comm("a-very-long-command-name");
        let comm = host.current_comm();
        assert_eq!(c_str(&comm).len(), TASK_COMM_LEN - 1);
    }

    #[test]
    fn test_send_signal_targets_current_context() {
        let host = SimulatedHost::default();
        host.switch_to(Pid(5), Tid(6));
        host.send_signal(9);
        assert_eq!(host.delivered(), vec![DeliveredSignal { pid_tgid: (5 << 32) | 6, signal: 9 }]);
    }
}
