//! Pid namespace walker
//!
//! Reads pid numbers out of `struct pid` through runtime offsets:
//!
//! ```text
//! task_struct ──(+task_struct_pid)──▶ struct pid
//!                                       ├─ level            (+pid_level)
//!                                       └─ numbers[level+1] (+pid_numbers, stride sizeof_upid)
//!                                            └─ .nr at the start of each upid
//! ```
//!
//! `numbers[0]` is the root pid namespace, `numbers[level]` the innermost
//! one. Every read is fault tolerant: an unreadable address yields 0, and
//! so does every walk while the pid offsets are unresolved.

use crate::host::{read_or_zero, KernelMemory};
use crate::offsets::KernelOffsets;

/// `task->thread_pid`, 0 when unreadable
#[inline(always)]
pub fn get_pid_struct<K: KernelMemory>(mem: &K, offsets: &KernelOffsets, task: u64) -> u64 {
    if !offsets.has_pid_offsets() {
        return 0;
    }

    read_or_zero(mem, task.wrapping_add(offsets.task_struct_pid))
}

/// Root namespace nr, read from `&pid->numbers[0].nr`
#[inline(always)]
pub fn get_root_nr_from_pid_struct<K: KernelMemory>(
    mem: &K,
    offsets: &KernelOffsets,
    pid: u64,
) -> u32 {
    if pid == 0 || !offsets.has_pid_offsets() {
        return 0;
    }

    read_or_zero(mem, pid.wrapping_add(offsets.pid_numbers))
}

#[inline(always)]
pub fn get_root_nr_from_task_struct<K: KernelMemory>(
    mem: &K,
    offsets: &KernelOffsets,
    task: u64,
) -> u32 {
    let pid = get_pid_struct(mem, offsets, task);
    get_root_nr_from_pid_struct(mem, offsets, pid)
}

/// Innermost namespace nr, read from `&pid->numbers[pid->level].nr`
#[inline(always)]
pub fn get_namespace_nr_from_task_struct<K: KernelMemory>(
    mem: &K,
    offsets: &KernelOffsets,
    task: u64,
) -> u32 {
    let pid = get_pid_struct(mem, offsets, task);
    if pid == 0 || !offsets.has_pid_offsets() {
        return 0;
    }

    let pid_level: u32 = read_or_zero(mem, pid.wrapping_add(offsets.pid_level));

    let namespace_numbers_offset = u64::from(pid_level).wrapping_mul(offsets.sizeof_upid);
    read_or_zero(
        mem,
        pid.wrapping_add(offsets.pid_numbers).wrapping_add(namespace_numbers_offset),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::AnyBitPattern;

    /// One flat region starting at `base`
    struct Region {
        base: u64,
        bytes: Vec<u8>,
    }

    impl Region {
        fn put(&mut self, addr: u64, value: &[u8]) {
            let start = (addr - self.base) as usize;
            self.bytes[start..start + value.len()].copy_from_slice(value);
        }
    }

    impl KernelMemory for Region {
        fn read<T: AnyBitPattern>(&self, addr: u64) -> Option<T> {
            let start = usize::try_from(addr.checked_sub(self.base)?).ok()?;
            let bytes = self.bytes.get(start..start + core::mem::size_of::<T>())?;
            bytemuck::try_pod_read_unaligned(bytes).ok()
        }
    }

    const OFFSETS: KernelOffsets = KernelOffsets {
        task_struct_pid: 0x10,
        pid_level: 0x4,
        pid_numbers: 0x40,
        sizeof_upid: 16,
        task_struct_mm: 0,
        mm_struct_exe_file: 0,
        file_f_inode: 0,
        inode_i_ino: 0,
    };

    fn layout(level: u32) -> Region {
        let mut mem = Region { base: 0x1000, bytes: vec![0; 0x200] };
        let task = 0x1000;
        let pid = 0x1100u64;
        mem.put(task + OFFSETS.task_struct_pid, &pid.to_ne_bytes());
        mem.put(pid + OFFSETS.pid_level, &level.to_ne_bytes());
        for (i, nr) in [4242u32, 300, 7].iter().enumerate() {
            mem.put(pid + OFFSETS.pid_numbers + i as u64 * OFFSETS.sizeof_upid, &nr.to_ne_bytes());
        }
        mem
    }

    #[test]
    fn test_namespace_nr_follows_level() {
        let mem = layout(2);
        assert_eq!(get_namespace_nr_from_task_struct(&mem, &OFFSETS, 0x1000), 7);
        assert_eq!(get_root_nr_from_task_struct(&mem, &OFFSETS, 0x1000), 4242);
    }

    #[test]
    fn test_unreadable_task_yields_zero() {
        let mem = layout(1);
        assert_eq!(get_namespace_nr_from_task_struct(&mem, &OFFSETS, 0xdead_0000), 0);
        assert_eq!(get_root_nr_from_task_struct(&mem, &OFFSETS, 0xdead_0000), 0);
    }

    #[test]
    fn test_unresolved_offsets_yield_zero() {
        let mut mem = Region { base: 0x1000, bytes: vec![0; 0x200] };
        // self-referencing first word: a zero-offset walk would read 0x1000
        mem.put(0x1000, &0x1000u64.to_ne_bytes());
        let offsets = KernelOffsets::default();

        assert_eq!(get_pid_struct(&mem, &offsets, 0x1000), 0);
        assert_eq!(get_root_nr_from_pid_struct(&mem, &offsets, 0x1000), 0);
        assert_eq!(get_root_nr_from_task_struct(&mem, &offsets, 0x1000), 0);
        assert_eq!(get_namespace_nr_from_task_struct(&mem, &offsets, 0x1000), 0);
    }
}
