//! Simulated kernel memory
//!
//! A sparse address space made of mapped byte regions. Reads that fall
//! outside every region, or straddle the end of one, fail the same way a
//! faulting `bpf_probe_read_kernel` does, which lets the namespace and
//! executable walkers be exercised without a kernel.

use std::collections::BTreeMap;

use bytemuck::{AnyBitPattern, NoUninit};
use procache_common::{KernelMemory, KernelOffsets};

#[derive(Debug, Default)]
pub struct SimulatedMemory {
    regions: BTreeMap<u64, Vec<u8>>,
}

impl SimulatedMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `len` zeroed bytes at `base`, replacing any region starting there
    pub fn map(&mut self, base: u64, len: usize) {
        self.regions.insert(base, vec![0; len]);
    }

    pub fn unmap(&mut self, base: u64) {
        self.regions.remove(&base);
    }

    fn region(&self, addr: u64, len: usize) -> Option<&[u8]> {
        let (base, bytes) = self.regions.range(..=addr).next_back()?;
        let start = usize::try_from(addr - base).ok()?;
        bytes.get(start..start.checked_add(len)?)
    }

    fn region_mut(&mut self, addr: u64, len: usize) -> Option<&mut [u8]> {
        let (base, bytes) = self.regions.range_mut(..=addr).next_back()?;
        let start = usize::try_from(addr - *base).ok()?;
        bytes.get_mut(start..start.checked_add(len)?)
    }

    /// Store `value` at `addr`, returning `false` if the range is not mapped
    pub fn write<T: NoUninit>(&mut self, addr: u64, value: T) -> bool {
        let src = bytemuck::bytes_of(&value);
        match self.region_mut(addr, src.len()) {
            Some(dst) => {
                dst.copy_from_slice(src);
                true
            }
            None => false,
        }
    }

    /// Lay out a task whose pid structure sits at `pid_struct`
    ///
    /// `numbers[i]` becomes the pid number seen from namespace level `i`;
    /// the task is at the deepest level (`numbers.len() - 1`). Only the
    /// fields the namespace walker reads are written.
    #[allow(clippy::cast_possible_truncation)]
    pub fn map_task(&mut self, offsets: &KernelOffsets, task: u64, pid_struct: u64, numbers: &[u32]) {
        self.map(task, offsets.task_struct_pid as usize + 8);
        self.write(task + offsets.task_struct_pid, pid_struct);

        let numbers_end = offsets.pid_numbers + offsets.sizeof_upid * numbers.len() as u64;
        self.map(pid_struct, numbers_end.max(offsets.pid_level + 4) as usize);
        let level = numbers.len().saturating_sub(1) as u32;
        self.write(pid_struct + offsets.pid_level, level);
        for (i, nr) in numbers.iter().enumerate() {
            self.write(pid_struct + offsets.pid_numbers + offsets.sizeof_upid * i as u64, *nr);
        }
    }
}

impl KernelMemory for SimulatedMemory {
    fn read<T: AnyBitPattern>(&self, addr: u64) -> Option<T> {
        let bytes = self.region(addr, std::mem::size_of::<T>())?;
        bytemuck::try_pod_read_unaligned(bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_inside_region() {
        let mut mem = SimulatedMemory::new();
        mem.map(0x1000, 16);
        assert!(mem.write(0x1004, 0xdead_beef_u32));
        assert_eq!(mem.read::<u32>(0x1004), Some(0xdead_beef));
        assert_eq!(mem.read::<u32>(0x1000), Some(0));
    }

    #[test]
    fn test_read_faults_outside_regions() {
        let mut mem = SimulatedMemory::new();
        mem.map(0x1000, 8);
        assert_eq!(mem.read::<u64>(0x0ff8), None);
        // straddles the end of the region
        assert_eq!(mem.read::<u64>(0x1004), None);
        assert!(!mem.write(0x2000, 1u32));

        mem.unmap(0x1000);
        assert_eq!(mem.read::<u8>(0x1000), None);
    }
}
