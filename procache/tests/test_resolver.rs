//! Resolving execution contexts against the userspace cache store

use procache::domain::types::pid_tgid;
use procache::domain::{Cookie, Pid, Tid};
use procache::store::CacheStore;
use procache_common::resolver::{get_pid_cache, resolve};
use procache_common::{PidCache, ProcCache};

fn image_with_inode(ino: u64) -> ProcCache {
    let mut image = ProcCache::default();
    image.entry.executable.path_key.ino = ino;
    image
}

#[test]
fn test_resolve_then_image_deleted() {
    let store = CacheStore::with_capacity(64);
    store.insert_pid(Pid(100), PidCache { cookie: 42, ppid: 1, ..PidCache::default() }).unwrap();
    store.insert_image(Cookie(42), image_with_inode(777)).unwrap();

    let resolved = resolve(&store, pid_tgid(Pid(100), Tid(100)));
    assert_eq!(resolved.context.pid, 100);
    assert_eq!(resolved.context.inode, 777);
    assert!(resolved.image.is_some());

    store.remove_image(Cookie(42));

    let resolved = resolve(&store, pid_tgid(Pid(100), Tid(100)));
    assert_eq!(resolved.context.inode, 0);
    assert!(resolved.image.is_none());

    // the thread group entry itself is untouched
    let entry = get_pid_cache(&store, 100).unwrap();
    assert_eq!(entry.cookie, 42);
    assert_eq!(entry.ppid, 1);
}

#[test]
fn test_cold_cache() {
    let store = CacheStore::with_capacity(64);
    for pid in [1, 100, 4_000_000] {
        let resolved = resolve(&store, pid_tgid(Pid(pid), Tid(pid + 1)));
        assert_eq!(resolved.context.pid, pid);
        assert_eq!(resolved.context.tid, pid + 1);
        assert_eq!(resolved.context.inode, 0);
        assert!(resolved.image.is_none());
    }
}

#[test]
fn test_zero_cookie_skips_image_lookup() {
    let store = CacheStore::with_capacity(64);
    store.insert_pid(Pid(7), PidCache::default()).unwrap();
    // an entry under the sentinel must never be reached
    store.insert_image(Cookie::NONE, image_with_inode(1)).unwrap();

    let before = store.proc_table().lookups();
    let resolved = resolve(&store, pid_tgid(Pid(7), Tid(7)));
    assert_eq!(store.proc_table().lookups(), before);
    assert_eq!(resolved.context.inode, 0);
    assert!(resolved.image.is_none());
}

#[test]
fn test_netns_and_ignored_pids() {
    let store = CacheStore::with_capacity(64);
    store.set_netns(Tid(11), 4026531840).unwrap();
    store.ignore_pid(Pid(10)).unwrap();

    let resolved = resolve(&store, pid_tgid(Pid(10), Tid(11)));
    assert_eq!(resolved.context.netns, 4026531840);
    assert!(resolved.context.is_kworker());

    store.unignore_pid(Pid(10));
    let resolved = resolve(&store, pid_tgid(Pid(10), Tid(11)));
    assert!(!resolved.context.is_kworker());
}
