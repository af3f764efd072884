//! Event buffer pool
//!
//! Slots are picked by `pid_tgid % capacity`. This is not a queue: a slot is
//! reused in place, and a concurrent event whose `pid_tgid` collides on the
//! same slot overwrites an in-flight record. That hazard is accepted in
//! exchange for zero allocation; raise the pool size to make it rarer.

use crate::event::{ExecSyscall, ProcessEvent};
use crate::maps::{CacheMaps, EventSlots};
use crate::resolver::fill_process_context_with_pid_tgid;
use crate::snapshot::{copy_pid_cache_except_exit_ts, copy_proc_cache};
use crate::EVENT_FLAGS_ACTIVITY_DUMP_SAMPLE;

/// Slot index for `pid_tgid`, `None` for an empty pool
#[inline(always)]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
pub const fn event_slot_index(pid_tgid: u64, capacity: u32) -> Option<u32> {
    if capacity == 0 {
        return None;
    }

    // the remainder is below `capacity`, so it fits in a u32
    Some((pid_tgid % capacity as u64) as u32)
}

/// Hand out a zeroed event record for `pid_tgid`
///
/// Whatever a previous, unrelated event left in the slot is wiped. Every
/// event except forks is flagged as eligible for activity dump sampling.
/// Returns `None` when the slot cannot be obtained; the caller then drops
/// enrichment for this event.
#[inline(always)]
pub fn new_process_event<S: EventSlots>(
    slots: &S,
    pid_tgid: u64,
    is_fork: bool,
) -> Option<S::Slot<'_>> {
    let key = event_slot_index(pid_tgid, slots.capacity())?;
    let mut evt = slots.slot(key)?;

    bytemuck::write_zeroes::<ProcessEvent>(&mut *evt);
    if !is_fork {
        evt.event.flags |= EVENT_FLAGS_ACTIVITY_DUMP_SAMPLE;
    }

    Some(evt)
}

/// Stamp `evt` and copy the cached identity of `pid_tgid` into it
///
/// Cache misses leave the matching part of the record zeroed.
#[inline(always)]
pub fn fill_process_event<M: CacheMaps>(
    maps: &M,
    evt: &mut ProcessEvent,
    pid_tgid: u64,
    kind: u32,
    now: u64,
) {
    evt.event.kind = kind;
    evt.event.timestamp = now;

    if let Some(image) = fill_process_context_with_pid_tgid(maps, &mut evt.process, pid_tgid) {
        copy_proc_cache(&image, &mut evt.proc_entry);
    }
    if let Some(pid_entry) = maps.pid_cache(evt.process.pid) {
        copy_pid_cache_except_exit_ts(&pid_entry, &mut evt.pid_entry);
    }
}

/// Copy the exec argument and environment buffer references into `event`
#[inline(always)]
pub fn fill_args_envs(event: &mut ProcessEvent, syscall: &ExecSyscall) {
    event.args_id = syscall.args.id;
    event.args_truncated = syscall.args.truncated;
    event.envs_id = syscall.envs.id;
    event.envs_truncated = syscall.envs.truncated;
}
