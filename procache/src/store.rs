//! # Userspace Cache Store
//!
//! Concurrent, bounded key/value tables that mirror the eBPF maps. Each table
//! is a `DashMap`, so operations on different keys rarely contend. Every
//! operation touches a single key of a single table; no lock is ever held
//! across two tables.
//!
//! [`CacheStore`] bundles the tables the cache helpers need and implements
//! the [`CacheMaps`], [`CacheWriter`] and [`SignalQueue`] seams on top of
//! them, plus the control-plane entry points (`request_signal`,
//! `ignore_pid`, `set_netns`).

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use procache_common::{
    CacheMaps, CacheWriter, PendingSignal, PidCache, ProcCache, SignalQueue, MAP_COOKIE_REFS,
    MAP_KILL_LIST, MAP_NETNS_CACHE, MAP_PID_CACHE, MAP_PID_IGNORED, MAP_PROC_CACHE,
};

use crate::domain::{Cookie, Pid, StoreError, Tid};

/// Bounded concurrent hash table
pub struct Table<K, V> {
    name: &'static str,
    capacity: usize,
    map: DashMap<K, V>,
    len: AtomicUsize,
    lookups: AtomicU64,
}

impl<K: Hash + Eq, V: Clone> Table<K, V> {
    #[must_use]
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            map: DashMap::new(),
            len: AtomicUsize::new(0),
            lookups: AtomicU64::new(0),
        }
    }

    /// Claim room for one more entry, failing when the table is full
    fn reserve(&self) -> Result<(), StoreError> {
        self.len
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| StoreError::TableFull { table: self.name, capacity: self.capacity })
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.map.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.map.contains_key(key)
    }

    /// Insert or replace `key`
    ///
    /// # Errors
    /// Returns [`StoreError::TableFull`] when `key` is new and the table is
    /// at capacity.
    pub fn insert(&self, key: K, value: V) -> Result<(), StoreError> {
        match self.map.entry(key) {
            Entry::Occupied(mut slot) => {
                slot.insert(value);
            }
            Entry::Vacant(slot) => {
                self.reserve()?;
                slot.insert(value);
            }
        }
        Ok(())
    }

    /// Remove `key`, a no-op when it is absent
    pub fn remove(&self, key: &K) -> Option<V> {
        let (_, removed) = self.map.remove(key)?;
        self.len.fetch_sub(1, Ordering::AcqRel);
        Some(removed)
    }

    /// Read-modify-write one entry while holding its bucket lock
    ///
    /// `f` sees the current value (if any) and returns the new one, or
    /// `None` to remove the entry.
    ///
    /// # Errors
    /// Returns [`StoreError::TableFull`] when `f` creates a new entry in a
    /// full table.
    pub fn update<F>(&self, key: K, f: F) -> Result<Option<V>, StoreError>
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        match self.map.entry(key) {
            Entry::Occupied(mut slot) => match f(Some(slot.get())) {
                Some(value) => {
                    slot.insert(value.clone());
                    Ok(Some(value))
                }
                None => {
                    slot.remove();
                    self.len.fetch_sub(1, Ordering::AcqRel);
                    Ok(None)
                }
            },
            Entry::Vacant(slot) => match f(None) {
                Some(value) => {
                    self.reserve()?;
                    slot.insert(value.clone());
                    Ok(Some(value))
                }
                None => Ok(None),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of `get`/`contains` calls served so far
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }
}

/// The cache tables, mirroring the maps of the eBPF program
pub struct CacheStore {
    pid_cache: Table<u32, PidCache>,
    proc_cache: Table<u64, ProcCache>,
    cookie_refs: Table<u64, u32>,
    netns_cache: Table<u32, u32>,
    pid_ignored: Table<u32, ()>,
    kill_list: Table<u32, PendingSignal>,
}

impl CacheStore {
    /// Create a store whose tables each hold at most `capacity` entries
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pid_cache: Table::new(MAP_PID_CACHE, capacity),
            proc_cache: Table::new(MAP_PROC_CACHE, capacity),
            cookie_refs: Table::new(MAP_COOKIE_REFS, capacity),
            netns_cache: Table::new(MAP_NETNS_CACHE, capacity),
            pid_ignored: Table::new(MAP_PID_IGNORED, capacity),
            kill_list: Table::new(MAP_KILL_LIST, capacity),
        }
    }

    pub fn pid_table(&self) -> &Table<u32, PidCache> {
        &self.pid_cache
    }

    pub fn proc_table(&self) -> &Table<u64, ProcCache> {
        &self.proc_cache
    }

    pub fn kill_table(&self) -> &Table<u32, PendingSignal> {
        &self.kill_list
    }

    /// Seed or overwrite the thread group entry of `pid`
    ///
    /// # Errors
    /// Returns [`StoreError::TableFull`] when the pid table is full.
    pub fn insert_pid(&self, pid: Pid, entry: PidCache) -> Result<(), StoreError> {
        self.pid_cache.insert(pid.0, entry)
    }

    /// Seed or overwrite the image entry for `cookie`
    ///
    /// # Errors
    /// Returns [`StoreError::TableFull`] when the image table is full.
    pub fn insert_image(&self, cookie: Cookie, entry: ProcCache) -> Result<(), StoreError> {
        self.proc_cache.insert(cookie.0, entry)
    }

    pub fn remove_image(&self, cookie: Cookie) -> Option<ProcCache> {
        self.proc_cache.remove(&cookie.0)
    }

    /// Current number of thread groups referencing `cookie`
    pub fn cookie_refs(&self, cookie: Cookie) -> u32 {
        self.cookie_refs.get(&cookie.0).unwrap_or(0)
    }

    /// Queue a one-shot signal for the next hook firing in `pid`
    ///
    /// # Errors
    /// Returns [`StoreError::TableFull`] when the pending-signal table is full.
    pub fn request_signal(&self, pid: Pid, signal: u32) -> Result<(), StoreError> {
        self.kill_list.insert(pid.0, PendingSignal::new(signal))
    }

    /// Queue a one-shot signal that only fires while `pid` still runs the
    /// image identified by `cookie`
    ///
    /// # Errors
    /// Returns [`StoreError::TableFull`] when the pending-signal table is full.
    pub fn request_signal_for(
        &self,
        pid: Pid,
        signal: u32,
        cookie: Cookie,
    ) -> Result<(), StoreError> {
        self.kill_list.insert(pid.0, PendingSignal::for_cookie(signal, cookie.0))
    }

    /// # Errors
    /// Returns [`StoreError::TableFull`] when the ignore table is full.
    pub fn ignore_pid(&self, pid: Pid) -> Result<(), StoreError> {
        self.pid_ignored.insert(pid.0, ())
    }

    pub fn unignore_pid(&self, pid: Pid) {
        self.pid_ignored.remove(&pid.0);
    }

    /// Record the network namespace of thread `tid`
    ///
    /// # Errors
    /// Returns [`StoreError::TableFull`] when the namespace table is full.
    pub fn set_netns(&self, tid: Tid, netns: u32) -> Result<(), StoreError> {
        self.netns_cache.insert(tid.0, netns)
    }
}

impl CacheMaps for CacheStore {
    fn pid_cache(&self, tgid: u32) -> Option<PidCache> {
        self.pid_cache.get(&tgid)
    }

    fn proc_cache(&self, cookie: u64) -> Option<ProcCache> {
        self.proc_cache.get(&cookie)
    }

    fn netns(&self, tid: u32) -> Option<u32> {
        self.netns_cache.get(&tid)
    }

    fn is_pid_ignored(&self, pid: u32) -> bool {
        self.pid_ignored.contains(&pid)
    }
}

impl CacheWriter for CacheStore {
    fn put_pid_cache(&self, tgid: u32, entry: &PidCache) -> bool {
        match self.pid_cache.insert(tgid, *entry) {
            Ok(()) => true,
            Err(e) => {
                debug!("dropping pid entry {tgid}: {e}");
                false
            }
        }
    }

    fn put_proc_cache(&self, cookie: u64, entry: &ProcCache) -> bool {
        match self.proc_cache.insert(cookie, *entry) {
            Ok(()) => true,
            Err(e) => {
                debug!("dropping image entry {cookie:#x}: {e}");
                false
            }
        }
    }

    fn delete_pid_cache(&self, tgid: u32) {
        self.pid_cache.remove(&tgid);
    }

    fn delete_proc_cache(&self, cookie: u64) {
        self.proc_cache.remove(&cookie);
    }

    fn acquire_cookie(&self, cookie: u64) {
        if let Err(e) = self.cookie_refs.update(cookie, |refs| Some(refs.map_or(1, |n| n + 1))) {
            debug!("cannot track references of {cookie:#x}: {e}");
        }
    }

    fn release_cookie(&self, cookie: u64) -> u32 {
        // dropping the last reference removes the counter entry
        self.cookie_refs
            .update(cookie, |refs| refs.and_then(|n| n.checked_sub(1)).filter(|n| *n > 0))
            .ok()
            .flatten()
            .unwrap_or(0)
    }
}

impl SignalQueue for CacheStore {
    fn pending_signal(&self, pid: u32) -> Option<PendingSignal> {
        self.kill_list.get(&pid)
    }

    fn delete_pending_signal(&self, pid: u32) {
        self.kill_list.remove(&pid);
    }
}
