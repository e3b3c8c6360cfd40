use lbalock::{
    EventIndex, LockError, LockKind, LockManager, LockManagerOptions, NamespaceId, ReleaseRefusal,
    SharedLockManager,
};

fn manager(nodes: u32, namespaces: u32) -> LockManager {
    LockManager::new(
        LockManagerOptions::default()
            .max_nodes(nodes)
            .max_namespaces(namespaces),
    )
    .unwrap()
}

#[test]
fn same_range_in_different_namespaces_does_not_conflict() {
    let mut mgr = manager(16, 4);
    for ns in 0..4 {
        let outcome = mgr
            .lock_request(0, 99, LockKind::Write, false, NamespaceId(ns))
            .unwrap();
        assert!(outcome.is_added(), "namespace {ns}: {outcome:?}");
    }
    for ns in 0..4 {
        assert_eq!(mgr.resident_count(NamespaceId(ns)).unwrap(), 1);
        assert!(mgr.verify(NamespaceId(ns)).unwrap().is_ok());
    }
}

#[test]
fn event_counters_are_per_namespace() {
    let mut mgr = manager(16, 2);
    let a = mgr
        .lock_request(0, 9, LockKind::Read, true, NamespaceId(0))
        .unwrap()
        .handle()
        .unwrap();
    let b = mgr
        .lock_request(0, 9, LockKind::Read, true, NamespaceId(1))
        .unwrap()
        .handle()
        .unwrap();
    assert_eq!(mgr.event_index(a), Some(EventIndex(1)));
    assert_eq!(mgr.event_index(b), Some(EventIndex(1)));
    assert_eq!(mgr.namespace_of(b), Some(NamespaceId(1)));
}

#[test]
fn pool_is_shared_across_namespaces() {
    let mut mgr = manager(4, 2);
    let mut held = Vec::new();
    for i in 0..4u64 {
        let ns = NamespaceId((i % 2) as u32);
        let h = mgr
            .lock_request(i * 10, i * 10 + 5, LockKind::Write, false, ns)
            .unwrap()
            .handle()
            .unwrap();
        held.push((h, ns));
    }
    assert!(matches!(
        mgr.lock_request(500, 501, LockKind::Write, false, NamespaceId(1)),
        Err(LockError::PoolExhausted)
    ));
    assert_eq!(mgr.stats().snapshot().pool_exhausted, 1);

    let (h, ns) = held.remove(0);
    mgr.lock_release(h, ns).unwrap();
    assert!(mgr
        .lock_request(500, 501, LockKind::Write, false, NamespaceId(1))
        .unwrap()
        .is_added());
}

#[test]
fn churn_in_one_namespace_leaves_another_untouched() {
    let mut mgr = manager(8, 2);
    let quiet = NamespaceId(0);
    let busy = NamespaceId(1);
    let holder = mgr
        .lock_request(0, 9, LockKind::Write, true, quiet)
        .unwrap()
        .handle()
        .unwrap();
    let waiter = mgr
        .lock_request(0, 9, LockKind::Read, true, quiet)
        .unwrap()
        .handle()
        .unwrap();
    let before = mgr.dump(quiet).unwrap().to_string();

    for _ in 0..40 {
        let h = mgr
            .lock_request(0, 9, LockKind::Write, true, busy)
            .unwrap()
            .handle()
            .unwrap();
        mgr.lock_release(h, busy).unwrap();
    }
    assert!(mgr.stats().compactions() > 0);
    assert_eq!(mgr.dump(quiet).unwrap().to_string(), before);
    assert_eq!(mgr.event_index(holder), Some(EventIndex(1)));
    assert_eq!(mgr.event_index(waiter), Some(EventIndex(2)));
}

#[test]
fn out_of_range_namespace_is_rejected_everywhere() {
    let mut mgr = manager(8, 2);
    let bad = NamespaceId(2);
    assert!(matches!(
        mgr.lock_request(0, 1, LockKind::Read, true, bad),
        Err(LockError::InvalidNamespace(2))
    ));
    assert!(matches!(mgr.verify(bad), Err(LockError::InvalidNamespace(2))));
    assert!(matches!(mgr.dump(bad), Err(LockError::InvalidNamespace(2))));
    assert!(matches!(mgr.holders(bad), Err(LockError::InvalidNamespace(2))));

    let h = mgr
        .lock_request(0, 1, LockKind::Read, true, NamespaceId(0))
        .unwrap()
        .handle()
        .unwrap();
    assert!(matches!(
        mgr.lock_release(h, bad),
        Err(LockError::InvalidNamespace(2))
    ));
    assert!(matches!(
        mgr.lock_release(h, NamespaceId(1)),
        Err(LockError::InvalidRelease {
            reason: ReleaseRefusal::NotFound
        })
    ));
}

#[test]
fn shared_manager_serializes_namespaces_across_threads() {
    let shared = SharedLockManager::from(manager(64, 4));
    let workers: Vec<_> = (0..4u32)
        .map(|ns| {
            let shared = shared.clone();
            std::thread::spawn(move || {
                let ns = NamespaceId(ns);
                for round in 0..50u64 {
                    let first = shared
                        .lock_request(0, 15, LockKind::Write, true, ns)
                        .unwrap();
                    let second = shared
                        .lock_request(8, 20, LockKind::Read, true, ns)
                        .unwrap();
                    assert!(first.is_added(), "round {round}");
                    assert!(second.is_queued(), "round {round}");
                    let summary = shared.lock_release(first.handle().unwrap(), ns).unwrap();
                    assert_eq!(summary.granted().count(), 1);
                    shared.lock_release(second.handle().unwrap(), ns).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    let mgr = shared.lock();
    assert_eq!(mgr.live_count(), 0);
    assert_eq!(mgr.stats().snapshot().releases, 400);
    assert_eq!(mgr.stats().snapshot().collisions, 0);
}
