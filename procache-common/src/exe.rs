//! Executable inode of a task: `task->mm->exe_file->f_inode->i_ino`

use crate::host::{read_or_zero, KernelMemory};
use crate::offsets::KernelOffsets;

/// Inode of the task's executable, 0 for kernel threads, unresolved offsets
/// or unreadable memory
#[inline(always)]
pub fn get_exe_inode_from_task_struct<K: KernelMemory>(
    mem: &K,
    offsets: &KernelOffsets,
    task: u64,
) -> u64 {
    if !offsets.has_exe_offsets() {
        return 0;
    }

    let mm: u64 = read_or_zero(mem, task.wrapping_add(offsets.task_struct_mm));
    if mm == 0 {
        return 0;
    }

    let exe_file: u64 = read_or_zero(mem, mm.wrapping_add(offsets.mm_struct_exe_file));
    if exe_file == 0 {
        return 0;
    }

    let inode: u64 = read_or_zero(mem, exe_file.wrapping_add(offsets.file_f_inode));
    if inode == 0 {
        return 0;
    }

    read_or_zero(mem, inode.wrapping_add(offsets.inode_i_ino))
}
