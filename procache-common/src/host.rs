//! Execution environment seams
//!
//! [`Host`] stands for the BPF helpers that describe the current execution
//! context, [`KernelMemory`] for `bpf_probe_read_kernel`. The eBPF program
//! implements both on top of the real helpers; userspace provides simulated
//! implementations.

use bytemuck::AnyBitPattern;

use crate::TASK_COMM_LEN;

/// Helpers describing and acting on the current execution context
pub trait Host {
    /// `bpf_get_current_pid_tgid()`: tgid in the upper 32 bits, tid in the lower
    fn current_pid_tgid(&self) -> u64;

    /// `bpf_get_current_comm()`, zeroed when unavailable
    fn current_comm(&self) -> [u8; TASK_COMM_LEN];

    /// Whether `bpf_send_signal` can be used by this program
    fn send_signal_available(&self) -> bool;

    /// Ask the kernel to deliver `signal` to the current execution context
    ///
    /// Fire and forget: the helper's outcome is not observable.
    fn send_signal(&self, signal: u32);

    /// Fresh image cookie: never zero, never derived from the pid
    fn new_cookie(&self) -> u64;

    /// Monotonic nanoseconds since boot
    fn now_ns(&self) -> u64;
}

/// Fault-tolerant reads of foreign memory
pub trait KernelMemory {
    /// Read a `T` at `addr`, `None` if any byte of the range is unreadable
    fn read<T: AnyBitPattern>(&self, addr: u64) -> Option<T>;
}

/// Read a `T` at `addr`, degrading to all-zeroes on failure
#[inline(always)]
pub fn read_or_zero<K: KernelMemory, T: AnyBitPattern>(mem: &K, addr: u64) -> T {
    mem.read(addr).unwrap_or_else(T::zeroed)
}
