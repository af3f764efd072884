//! One-shot signal dispatch through the engine

use procache::domain::{Cookie, Pid, Tid};
use procache::engine::ProcessCache;
use procache::host::{DeliveredSignal, SimulatedHost};
use procache::settings::Settings;
use procache_common::{CacheMaps, KernelOffsets, PidCache, SignalDispatch};

fn cache() -> ProcessCache {
    ProcessCache::new(&Settings::default(), KernelOffsets::default(), SimulatedHost::default())
}

#[test]
fn test_signal_delivered_at_most_once() {
    let cache = cache();
    cache.host().switch_to(Pid(300), Tid(301));
    cache.store().request_signal(Pid(300), 9).unwrap();

    assert_eq!(cache.dispatch_signal(Pid(300)), SignalDispatch::Delivered(9));
    assert_eq!(cache.dispatch_signal(Pid(300)), SignalDispatch::NotPending);

    let delivered = cache.host().delivered();
    assert_eq!(delivered, vec![DeliveredSignal { pid_tgid: (300 << 32) | 301, signal: 9 }]);
    assert!(cache.store().kill_table().is_empty());
}

#[test]
fn test_zero_signal_is_left_alone() {
    let cache = cache();
    cache.store().request_signal(Pid(5), 0).unwrap();
    assert_eq!(cache.dispatch_signal(Pid(5)), SignalDispatch::NotPending);
    assert_eq!(cache.store().kill_table().len(), 1);
    assert!(cache.host().delivered().is_empty());
}

#[test]
fn test_unavailable_keeps_request() {
    let cache = cache();
    cache.host().set_send_signal(false);
    cache.store().request_signal(Pid(5), 15).unwrap();

    assert_eq!(cache.dispatch_signal(Pid(5)), SignalDispatch::Unavailable);
    assert_eq!(cache.store().kill_table().len(), 1);

    cache.host().set_send_signal(true);
    assert_eq!(cache.dispatch_signal(Pid(5)), SignalDispatch::Delivered(15));
}

#[test]
fn test_stale_cookie_is_dropped() {
    let cache = cache();
    cache.store().insert_pid(Pid(8), PidCache { cookie: 2, ..PidCache::default() }).unwrap();
    // the request was aimed at the image that held pid 8 before
    cache.store().request_signal_for(Pid(8), 9, Cookie(1)).unwrap();

    assert_eq!(cache.dispatch_signal(Pid(8)), SignalDispatch::Stale);
    assert!(cache.host().delivered().is_empty());
    assert!(cache.store().kill_table().is_empty());
}

#[test]
fn test_matching_cookie_is_delivered() {
    let cache = cache();
    cache.store().insert_pid(Pid(8), PidCache { cookie: 2, ..PidCache::default() }).unwrap();
    cache.store().request_signal_for(Pid(8), 10, Cookie(2)).unwrap();

    assert_eq!(cache.dispatch_signal(Pid(8)), SignalDispatch::Delivered(10));
}

#[test]
fn test_fork_from_non_leader_thread_targets_its_group() {
    let cache = cache();
    cache.fork(Pid(1), Pid(100)).unwrap();
    cache.store().request_signal(Pid(100), 10).unwrap();

    // thread 105 of group 100 forks 200
    cache.host().switch_to(Pid(100), Tid(105));
    let (event, dispatch) = cache.fork_current(Pid(200));

    assert_eq!(dispatch, SignalDispatch::Delivered(10));
    assert!(cache.store().kill_table().is_empty());
    assert_eq!(event.unwrap().pid_entry.ppid, 100);
    assert_eq!(cache.store().pid_cache(200).unwrap().ppid, 100);
}
