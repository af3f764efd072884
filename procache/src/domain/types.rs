//! Identifier newtypes
//!
//! A tgid, a tid and an image cookie are all plain integers on the kernel
//! side. Wrapping them keeps the control plane from mixing them up.

use std::fmt;

/// Thread group id (what userspace calls a pid)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

impl From<u32> for Pid {
    fn from(pid: u32) -> Self {
        Pid(pid)
    }
}

/// Thread id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tid(pub u32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

/// Image cookie
///
/// Identifies one executable image instance. Zero is the "no image"
/// sentinel and never names a `ProcCache` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cookie(pub u64);

impl Cookie {
    pub const NONE: Cookie = Cookie(0);

    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cookie:{:#x}", self.0)
    }
}

/// Build the `bpf_get_current_pid_tgid()` value for a thread
#[must_use]
pub fn pid_tgid(pid: Pid, tid: Tid) -> u64 {
    (u64::from(pid.0) << 32) | u64::from(tid.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use procache_common::resolver::split_pid_tgid;

    #[test]
    fn test_pid_tgid_layout() {
        let value = pid_tgid(Pid(100), Tid(101));
        assert_eq!(value, (100u64 << 32) | 101);
        assert_eq!(split_pid_tgid(value), (100, 101));
    }

    #[test]
    fn test_display() {
        assert_eq!(Pid(42).to_string(), "PID:42");
        assert_eq!(Tid(7).to_string(), "TID:7");
        assert_eq!(Cookie(0xab).to_string(), "cookie:0xab");
        assert!(Cookie::NONE.is_none());
    }
}
