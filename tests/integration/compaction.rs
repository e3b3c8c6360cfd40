use lbalock::{
    EventIndex, LockHandle, LockKind, LockManager, LockManagerOptions, LockState, NamespaceId,
};

const NS: NamespaceId = NamespaceId(0);
const MAX_NODES: u32 = 8;

fn small_manager() -> LockManager {
    LockManager::new(LockManagerOptions::default().max_nodes(MAX_NODES)).unwrap()
}

fn request(mgr: &mut LockManager, start: u64, end: u64) -> LockHandle {
    mgr.lock_request(start, end, LockKind::Write, true, NS)
        .unwrap()
        .handle()
        .unwrap()
}

fn events(mgr: &LockManager, handles: &[LockHandle]) -> Vec<EventIndex> {
    handles
        .iter()
        .map(|h| mgr.event_index(*h).unwrap())
        .collect()
}

/// One holder with three waiters, then churn a disjoint range until the
/// counter wraps several times.
#[test]
fn renumbering_keeps_queue_order() {
    let mut mgr = small_manager();
    let holder = request(&mut mgr, 0, 100);
    let waiters = [request(&mut mgr, 0, 1), request(&mut mgr, 2, 3), request(&mut mgr, 4, 5)];
    let mut tracked = vec![holder];
    tracked.extend(waiters);

    for _ in 0..20 {
        let churn = request(&mut mgr, 200, 210);
        let seen = events(&mgr, &tracked);
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "order lost: {seen:?}");
        let newest = mgr.event_index(churn).unwrap();
        assert!(seen.iter().all(|e| *e < newest));
        assert!(newest.0 <= MAX_NODES);
        mgr.lock_release(churn, NS).unwrap();
    }
    assert!(mgr.stats().compactions() >= 3);
    assert!(mgr.verify(NS).unwrap().is_ok());

    let summary = mgr.lock_release(holder, NS).unwrap();
    let promoted: Vec<LockHandle> = summary.promoted.iter().map(|p| p.handle).collect();
    assert_eq!(promoted, waiters.to_vec());
    for waiter in waiters {
        assert_eq!(mgr.state(waiter), Some(LockState::Granted));
    }
}

#[test]
fn compaction_ranks_live_indices_densely() {
    let mut mgr = small_manager();
    let a = request(&mut mgr, 0, 9);
    let gap = request(&mut mgr, 10, 19);
    let b = request(&mut mgr, 20, 29);
    mgr.lock_release(gap, NS).unwrap();
    let mut churned = Vec::new();
    // Counter now at 3; push it to 7 with throwaway locks.
    for i in 0..4 {
        churned.push(request(&mut mgr, 100 + i * 10, 105 + i * 10));
    }
    for h in churned.drain(..) {
        mgr.lock_release(h, NS).unwrap();
    }
    assert_eq!(mgr.stats().compactions(), 0);

    let fresh = request(&mut mgr, 40, 49);
    assert_eq!(mgr.stats().compactions(), 1);
    assert_eq!(events(&mgr, &[a, b, fresh]), vec![EventIndex(1), EventIndex(2), EventIndex(3)]);
}

#[test]
fn empty_namespace_restarts_at_one() {
    let mut mgr = small_manager();
    for _ in 1..MAX_NODES {
        let h = request(&mut mgr, 0, 0);
        mgr.lock_release(h, NS).unwrap();
    }
    assert_eq!(mgr.stats().compactions(), 0);
    let h = request(&mut mgr, 0, 0);
    assert_eq!(mgr.stats().compactions(), 1);
    assert_eq!(mgr.event_index(h), Some(EventIndex(1)));
}

/// With every slot held in one namespace, the last request compacts down to
/// `max_nodes - 1` live indices and is issued `max_nodes` itself.
#[test]
fn full_pool_in_one_namespace_issues_max_nodes() {
    let mut mgr = small_manager();
    let handles: Vec<LockHandle> = (0..MAX_NODES as u64)
        .map(|i| request(&mut mgr, i * 10, i * 10 + 9))
        .collect();
    assert_eq!(mgr.stats().compactions(), 1);
    let seen = events(&mgr, &handles);
    let expected: Vec<EventIndex> = (1..=MAX_NODES).map(EventIndex).collect();
    assert_eq!(seen, expected);
    assert_eq!(seen.last(), Some(&EventIndex(MAX_NODES)));
    assert!(mgr.verify(NS).unwrap().is_ok());
}

#[test]
fn collisions_do_not_advance_the_counter() {
    let mut mgr = small_manager();
    let holder = request(&mut mgr, 0, 9);
    for _ in 0..50 {
        let outcome = mgr.lock_request(5, 6, LockKind::Read, false, NS).unwrap();
        assert!(outcome.handle().is_none());
    }
    assert_eq!(mgr.stats().compactions(), 0);
    let next = request(&mut mgr, 10, 19);
    assert_eq!(mgr.event_index(holder), Some(EventIndex(1)));
    assert_eq!(mgr.event_index(next), Some(EventIndex(2)));
}
