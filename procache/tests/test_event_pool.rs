//! Event buffer pool slot reuse

use procache::domain::types::pid_tgid;
use procache::domain::{Cookie, Pid, Tid};
use procache::pool::EventPool;
use procache::store::CacheStore;
use procache_common::entries::write_c_str;
use procache_common::event_pool::event_slot_index;
use procache_common::{
    PidCache, ProcCache, ProcessEvent, EVENT_FLAGS_ACTIVITY_DUMP_SAMPLE, EVENT_KIND_EXEC,
    EVENT_KIND_EXIT,
};

#[test]
fn test_congruent_pids_share_a_zeroed_slot() {
    let pool = EventPool::new(8);
    let first = pid_tgid(Pid(3), Tid(3));
    let second = first + 8;
    assert_eq!(event_slot_index(first, 8), event_slot_index(second, 8));

    {
        let mut evt = pool.acquire(first, false).unwrap();
        evt.args_id = 99;
        evt.ns_pid = 12;
        evt.pid_entry.cookie = 42;
        write_c_str(&mut evt.proc_entry.entry.comm, b"leaky");
    }

    let evt = pool.acquire(second, false).unwrap();
    let mut expected = ProcessEvent::default();
    expected.event.flags = EVENT_FLAGS_ACTIVITY_DUMP_SAMPLE;
    assert_eq!(*evt, expected);
}

#[test]
fn test_record_fills_from_cache() {
    let store = CacheStore::with_capacity(16);
    store
        .insert_pid(Pid(100), PidCache { cookie: 42, exit_timestamp: 5, ..PidCache::default() })
        .unwrap();
    let mut image = ProcCache::default();
    image.entry.executable.path_key.ino = 777;
    store.insert_image(Cookie(42), image).unwrap();

    let pool = EventPool::new(4);
    let evt = pool.record(&store, pid_tgid(Pid(100), Tid(102)), EVENT_KIND_EXEC, 1234).unwrap();
    assert_eq!(evt.event.kind, EVENT_KIND_EXEC);
    assert_eq!(evt.event.timestamp, 1234);
    assert_eq!((evt.process.pid, evt.process.tid), (100, 102));
    assert_eq!(evt.process.inode, 777);
    assert_eq!(evt.proc_entry.entry.executable.path_key.ino, 777);
    assert_eq!(evt.pid_entry.cookie, 42);
    // never copied from the cache
    assert_eq!(evt.pid_entry.exit_timestamp, 0);
}

#[test]
fn test_record_on_cold_cache() {
    let store = CacheStore::with_capacity(16);
    let pool = EventPool::new(4);
    let evt = pool.record(&store, pid_tgid(Pid(9), Tid(9)), EVENT_KIND_EXIT, 1).unwrap();
    assert_eq!(evt.process.pid, 9);
    assert_eq!(evt.proc_entry, ProcCache::default());
    assert_eq!(evt.pid_entry, PidCache::default());
}
