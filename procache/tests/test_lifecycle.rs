//! Fork, exec and exit keep the two cache levels consistent

use procache::domain::types::pid_tgid;
use procache::domain::{Cookie, Pid, Tid};
use procache::engine::ProcessCache;
use procache::host::SimulatedHost;
use procache::settings::Settings;
use procache_common::entries::write_c_str;
use procache_common::{
    CacheMaps, KernelOffsets, PidCache, ProcCache, EVENT_FLAGS_ACTIVITY_DUMP_SAMPLE,
    EVENT_KIND_EXIT, EVENT_KIND_FORK,
};

fn cache() -> ProcessCache {
    ProcessCache::new(&Settings::default(), KernelOffsets::default(), SimulatedHost::default())
}

fn bash() -> ProcCache {
    let mut image = ProcCache::default();
    write_c_str(&mut image.entry.comm, b"bash");
    write_c_str(&mut image.entry.tty_name, b"pts/3");
    image.entry.executable.path_key.ino = 9001;
    image
}

#[test]
fn test_fork_exec_exit() {
    let cache = cache();
    let host = cache.host();

    host.advance(10);
    let fork = cache.fork(Pid(1), Pid(100)).unwrap();
    assert_eq!(fork.event.kind, EVENT_KIND_FORK);
    assert_eq!(fork.event.flags & EVENT_FLAGS_ACTIVITY_DUMP_SAMPLE, 0);
    assert_eq!(fork.pid_entry.ppid, 1);
    assert_eq!(fork.pid_entry.fork_timestamp, 10);

    host.switch_to(Pid(100), Tid(100));
    host.advance(10);
    let (cookie, exec) = cache.exec(&bash()).unwrap();
    assert!(!cookie.is_none());
    let exec = exec.unwrap();
    assert_eq!(exec.process.inode, 9001);
    assert_eq!(exec.proc_entry.entry.exec_timestamp, 20);

    let summary = cache.summary(Pid(100)).unwrap();
    assert_eq!(summary.cookie, cookie);
    assert_eq!(summary.image.unwrap().comm, "bash");

    host.advance(10);
    let exit = cache.exit().unwrap();
    assert_eq!(exit.event.kind, EVENT_KIND_EXIT);
    assert_eq!(exit.pid_entry.exit_timestamp, 30);
    assert_eq!(exit.process.inode, 9001);

    assert!(cache.store().pid_cache(100).is_none());
    assert!(cache.store().proc_cache(cookie.0).is_none());
}

#[test]
fn test_forked_children_share_the_image() {
    let cache = cache();
    let host = cache.host();
    cache.fork(Pid(1), Pid(100)).unwrap();
    host.switch_to(Pid(100), Tid(100));
    let (cookie, _) = cache.exec(&bash()).unwrap();

    cache.fork(Pid(100), Pid(101)).unwrap();
    assert_eq!(cache.store().pid_cache(101).unwrap().cookie, cookie.0);
    assert_eq!(cache.store().cookie_refs(cookie), 2);

    // the parent leaves, the child still runs the image
    cache.exit().unwrap();
    assert_eq!(cache.store().cookie_refs(cookie), 1);
    assert!(cache.store().proc_cache(cookie.0).is_some());

    host.switch_to(Pid(101), Tid(101));
    cache.exit().unwrap();
    assert_eq!(cache.store().cookie_refs(cookie), 0);
    assert!(cache.store().proc_cache(cookie.0).is_none());
}

#[test]
fn test_exec_replaces_previous_image() {
    let cache = cache();
    let host = cache.host();
    host.switch_to(Pid(50), Tid(50));
    let (first, _) = cache.exec(&bash()).unwrap();
    let (second, _) = cache.exec(&ProcCache::default()).unwrap();

    assert_ne!(first, second);
    assert!(cache.store().proc_cache(first.0).is_none());
    assert_eq!(cache.store().pid_cache(50).unwrap().cookie, second.0);
}

#[test]
fn test_fork_keeps_parent_state_except_exit_timestamp() {
    let cache = cache();
    let parent = PidCache { cookie: 0, exit_timestamp: 99, user_session_id: 7, ..PidCache::default() };
    cache.store().insert_pid(Pid(10), parent).unwrap();

    let fork = cache.fork(Pid(10), Pid(11)).unwrap();
    assert_eq!(fork.pid_entry.user_session_id, 7);
    assert_eq!(cache.store().pid_cache(11).unwrap().exit_timestamp, 0);
}

#[test]
fn test_dying_kworker_exit_is_ignored() {
    let cache = cache();
    cache.store().insert_pid(Pid(2), PidCache::default()).unwrap();
    cache.host().switch_to(Pid(2), Tid(2));
    cache.host().set_comm("kworker/dying");

    assert!(cache.exit().is_none());
    assert!(cache.store().pid_cache(2).is_some());
}

#[test]
fn test_full_table_leaves_cache_unchanged() {
    let settings = Settings { table_capacity: 1, ..Settings::default() };
    let cache = ProcessCache::new(&settings, KernelOffsets::default(), SimulatedHost::default());
    cache.fork(Pid(1), Pid(2)).unwrap();
    assert!(cache.fork(Pid(1), Pid(3)).is_none());
    assert!(cache.store().pid_cache(3).is_none());
    assert_eq!(cache.store().cookie_refs(Cookie(1)), 0);
}

#[test]
fn test_fork_over_stale_entry_releases_its_image() {
    let cache = cache();
    let host = cache.host();
    cache.fork(Pid(1), Pid(100)).unwrap();
    host.switch_to(Pid(100), Tid(100));
    let (cookie, _) = cache.exec(&bash()).unwrap();

    // second fork into 101 without an exit in between (missed exit)
    cache.fork(Pid(100), Pid(101)).unwrap();
    cache.fork(Pid(100), Pid(101)).unwrap();
    assert_eq!(cache.store().cookie_refs(cookie), 2);

    cache.exit().unwrap();
    host.switch_to(Pid(101), Tid(101));
    cache.exit().unwrap();
    assert_eq!(cache.store().pid_table().len(), 0);
    assert_eq!(cache.store().cookie_refs(cookie), 0);
    assert!(cache.store().proc_cache(cookie.0).is_none());
}

#[test]
fn test_recycled_pid_drops_the_previous_image() {
    let cache = cache();
    let host = cache.host();
    cache.fork(Pid(1), Pid(100)).unwrap();
    host.switch_to(Pid(100), Tid(100));
    let (old, _) = cache.exec(&bash()).unwrap();

    // pid 100 is reused by a child of init before its exit was seen
    host.switch_to(Pid(1), Tid(1));
    let fork = cache.fork(Pid(1), Pid(100)).unwrap();
    assert_eq!(fork.pid_entry.cookie, 0);
    assert_eq!(cache.store().cookie_refs(old), 0);
    assert!(cache.store().proc_cache(old.0).is_none());
}

#[test]
fn test_fork_event_uses_the_forking_context_slot() {
    let settings = Settings { event_pool_size: 8, ..Settings::default() };
    let cache = ProcessCache::new(&settings, KernelOffsets::default(), SimulatedHost::default());
    cache.host().switch_to(Pid(100), Tid(100));

    // the child's slot (5) is busy, the parent's slot (4) is free
    let _held = cache.pool().acquire(pid_tgid(Pid(101), Tid(101)), false).unwrap();
    let fork = cache.fork(Pid(100), Pid(101)).unwrap();
    assert_eq!(fork.process.pid, 101);
    assert_eq!(fork.pid_entry.ppid, 100);
}
