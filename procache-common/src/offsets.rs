//! Runtime-resolved kernel structure offsets
//!
//! Kernel structure layouts vary by kernel build, so none of these offsets
//! can be compile-time constants. Userspace resolves them once per boot and
//! writes the table into the `OFFSETS` map (index 0), where the eBPF program
//! reads it before walking any kernel structure.
//!
//! A zero offset means "not resolved"; walkers that depend on it return 0.

use bytemuck::Zeroable;

/// Flat offset table consumed by the namespace and executable walkers
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable)]
pub struct KernelOffsets {
    /// `offsetof(struct task_struct, thread_pid)`
    pub task_struct_pid: u64,
    /// `offsetof(struct pid, level)`
    pub pid_level: u64,
    /// `offsetof(struct pid, numbers)`
    pub pid_numbers: u64,
    /// `sizeof(struct upid)`
    pub sizeof_upid: u64,
    /// `offsetof(struct task_struct, mm)`
    pub task_struct_mm: u64,
    /// `offsetof(struct mm_struct, exe_file)`
    pub mm_struct_exe_file: u64,
    /// `offsetof(struct file, f_inode)`
    pub file_f_inode: u64,
    /// `offsetof(struct inode, i_ino)`
    pub inode_i_ino: u64,
}

impl KernelOffsets {
    /// Index of the table in the `OFFSETS` array map
    pub const MAP_INDEX: u32 = 0;

    /// Whether the `task->thread_pid->numbers[]` walk can be attempted
    #[must_use]
    pub const fn has_pid_offsets(&self) -> bool {
        self.task_struct_pid != 0 && self.pid_numbers != 0 && self.sizeof_upid != 0
    }

    /// Whether the `task->mm->exe_file->f_inode->i_ino` walk can be attempted
    #[must_use]
    pub const fn has_exe_offsets(&self) -> bool {
        self.task_struct_mm != 0 && self.mm_struct_exe_file != 0 && self.file_f_inode != 0
    }
}
