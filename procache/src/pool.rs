//! Userspace event buffer pool
//!
//! A fixed array of pre-allocated [`ProcessEvent`] records, each behind its
//! own mutex. Slots are taken with `try_lock`: a slot still held by another
//! caller is reported as unobtainable rather than waited on, so event
//! production never blocks.

use parking_lot::{Mutex, MutexGuard};
use procache_common::event_pool::{fill_process_event, new_process_event};
use procache_common::{CacheMaps, EventSlots, ProcessEvent, EVENT_KIND_FORK};

pub struct EventPool {
    slots: Box<[Mutex<ProcessEvent>]>,
}

impl EventPool {
    /// Allocate `size` zeroed slots
    #[must_use]
    pub fn new(size: u32) -> Self {
        let slots = (0..size).map(|_| Mutex::new(ProcessEvent::default())).collect();
        Self { slots }
    }

    /// Zeroed, flagged record for `pid_tgid`
    ///
    /// `None` for an empty pool or when the slot is held elsewhere.
    pub fn acquire(&self, pid_tgid: u64, is_fork: bool) -> Option<MutexGuard<'_, ProcessEvent>> {
        new_process_event(self, pid_tgid, is_fork)
    }

    /// Acquire a record for `pid_tgid` and fill it from the cache
    pub fn record<M: CacheMaps>(
        &self,
        maps: &M,
        pid_tgid: u64,
        kind: u32,
        now: u64,
    ) -> Option<MutexGuard<'_, ProcessEvent>> {
        let mut evt = self.acquire(pid_tgid, kind == EVENT_KIND_FORK)?;
        fill_process_event(maps, &mut evt, pid_tgid, kind, now);
        Some(evt)
    }
}

impl EventSlots for EventPool {
    type Slot<'a> = MutexGuard<'a, ProcessEvent>;

    #[allow(clippy::cast_possible_truncation)]
    fn capacity(&self) -> u32 {
        // built from a u32 count
        self.slots.len() as u32
    }

    fn slot(&self, index: u32) -> Option<Self::Slot<'_>> {
        self.slots.get(index as usize)?.try_lock()
    }
}
