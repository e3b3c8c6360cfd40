use lbalock::{
    LockError, LockHandle, LockKind, LockManager, LockOutcome, LockState, NamespaceId,
    ReleaseRefusal,
};

const NS: NamespaceId = NamespaceId(0);

fn submit_walkthrough(mgr: &mut LockManager) -> Vec<LockHandle> {
    let requests = [
        (1, 40, LockKind::Read),
        (1, 10, LockKind::Write),
        (8, 20, LockKind::Write),
        (21, 30, LockKind::Write),
        (31, 40, LockKind::Write),
        (1, 40, LockKind::Read),
    ];
    requests
        .into_iter()
        .map(|(start, end, kind)| {
            mgr.lock_request(start, end, kind, true, NS)
                .unwrap()
                .handle()
                .unwrap()
        })
        .collect()
}

fn assert_invariants(mgr: &LockManager) {
    let report = mgr.verify(NS).unwrap();
    assert!(report.is_ok(), "violations: {:?}\n{}", report.violations, mgr.dump(NS).unwrap());
}

fn holders(mgr: &LockManager) -> Vec<(LockHandle, Vec<LockHandle>)> {
    let mut holders = mgr.holders(NS).unwrap();
    holders.sort_by_key(|(h, _)| mgr.range(*h).unwrap().start());
    holders
}

#[test]
fn everything_queues_behind_the_first_request() {
    let mut mgr = LockManager::default();
    let h = submit_walkthrough(&mut mgr);

    assert_eq!(mgr.state(h[0]), Some(LockState::Granted));
    for waiter in &h[1..] {
        assert_eq!(mgr.state(*waiter), Some(LockState::Pending));
    }
    assert_eq!(holders(&mgr), vec![(h[0], h[1..].to_vec())]);
    assert_invariants(&mgr);
}

#[test]
fn releasing_first_promotes_all_five() {
    let mut mgr = LockManager::default();
    let h = submit_walkthrough(&mut mgr);

    let summary = mgr.lock_release(h[0], NS).unwrap();
    let promoted: Vec<LockHandle> = summary.promoted.iter().map(|p| p.handle).collect();
    assert_eq!(promoted, h[1..].to_vec());
    assert_eq!(mgr.live_count(), 5);
    assert_invariants(&mgr);

    // [1,10], [21,30] and [31,40] are granted; [8,20] waits behind [1,10]
    // and the second [1,40] waits behind [21,30].
    assert_eq!(
        holders(&mgr),
        vec![(h[1], vec![h[2]]), (h[3], vec![h[5]]), (h[4], vec![])]
    );
    let granted: Vec<LockHandle> = summary.granted().collect();
    assert_eq!(granted, vec![h[1], h[3], h[4]]);
}

#[test]
fn releasing_a_queued_request_is_refused_without_change() {
    let mut mgr = LockManager::default();
    let h = submit_walkthrough(&mut mgr);
    mgr.lock_release(h[0], NS).unwrap();

    let before = mgr.dump(NS).unwrap().to_string();
    let err = mgr.lock_release(h[5], NS).unwrap_err();
    assert!(matches!(
        err,
        LockError::InvalidRelease {
            reason: ReleaseRefusal::Pending
        }
    ));
    assert_eq!(mgr.dump(NS).unwrap().to_string(), before);
    assert_eq!(mgr.state(h[5]), Some(LockState::Pending));
    assert_eq!(mgr.live_count(), 5);
}

#[test]
fn sixth_request_is_refused_before_promotion_too() {
    let mut mgr = LockManager::default();
    let h = submit_walkthrough(&mut mgr);
    assert!(mgr.lock_release(h[5], NS).is_err());
    assert_eq!(holders(&mgr), vec![(h[0], h[1..].to_vec())]);
}

#[test]
fn walkthrough_drains_to_last_request() {
    let mut mgr = LockManager::default();
    let h = submit_walkthrough(&mut mgr);
    mgr.lock_release(h[0], NS).unwrap();

    // [8,20] moves behind [21,30], ahead of the later [1,40].
    mgr.lock_release(h[1], NS).unwrap();
    assert_invariants(&mgr);
    assert_eq!(holders(&mgr), vec![(h[3], vec![h[2], h[5]]), (h[4], vec![])]);

    mgr.lock_release(h[3], NS).unwrap();
    assert_invariants(&mgr);
    assert_eq!(holders(&mgr), vec![(h[2], vec![]), (h[4], vec![h[5]])]);

    mgr.lock_release(h[4], NS).unwrap();
    assert_invariants(&mgr);
    assert_eq!(holders(&mgr), vec![(h[2], vec![h[5]])]);

    mgr.lock_release(h[2], NS).unwrap();
    assert_invariants(&mgr);
    assert_eq!(holders(&mgr), vec![(h[5], vec![])]);

    mgr.lock_release(h[5], NS).unwrap();
    assert_eq!(mgr.live_count(), 0);
    assert_eq!(mgr.resident_count(NS).unwrap(), 0);
}

#[test]
fn collision_without_queueing_leaves_state_untouched() {
    let mut mgr = LockManager::default();
    let h = submit_walkthrough(&mut mgr);
    mgr.lock_release(h[0], NS).unwrap();

    let before = mgr.dump(NS).unwrap().to_string();
    let events: Vec<_> = h[1..].iter().map(|h| mgr.event_index(*h)).collect();
    let outcome = mgr.lock_request(15, 25, LockKind::Write, false, NS).unwrap();
    assert_eq!(outcome, LockOutcome::Collision);
    assert_eq!(mgr.dump(NS).unwrap().to_string(), before);
    assert_eq!(
        h[1..].iter().map(|h| mgr.event_index(*h)).collect::<Vec<_>>(),
        events
    );
    assert_eq!(mgr.live_count(), 5);
}
