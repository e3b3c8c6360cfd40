use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::Serialize;

/// Snapshot of lock manager counters at a point in time.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockStatsSnapshot {
    /// Lock requests that reached the pool.
    pub requests: u64,
    /// Requests granted immediately.
    pub added: u64,
    /// Requests placed in a pending queue.
    pub queued: u64,
    /// Requests rejected because of an overlap with queueing disabled.
    pub collisions: u64,
    /// Requests refused because the pool was empty.
    pub pool_exhausted: u64,
    /// Successful releases.
    pub releases: u64,
    /// Releases refused because the lock was not granted.
    pub refused_releases: u64,
    /// Waiters re-submitted after their holder was released.
    pub promotions: u64,
    /// Event-index compaction passes.
    pub compactions: u64,
    /// Tree rotations, single rotations counted once each.
    pub rotations: u64,
}

/// Counters describing lock manager activity.
#[derive(Default, Debug)]
pub struct LockStats {
    requests: AtomicU64,
    added: AtomicU64,
    queued: AtomicU64,
    collisions: AtomicU64,
    pool_exhausted: AtomicU64,
    releases: AtomicU64,
    refused_releases: AtomicU64,
    promotions: AtomicU64,
    compactions: AtomicU64,
    rotations: AtomicU64,
}

impl LockStats {
    /// Current count of requests that reached the pool.
    pub fn requests(&self) -> u64 {
        self.requests.load(AtomicOrdering::Relaxed)
    }

    /// Current count of compaction passes.
    pub fn compactions(&self) -> u64 {
        self.compactions.load(AtomicOrdering::Relaxed)
    }

    pub(crate) fn inc_requests(&self) {
        self.requests.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_added(&self) {
        self.added.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_queued(&self) {
        self.queued.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_collisions(&self) {
        self.collisions.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_pool_exhausted(&self) {
        self.pool_exhausted.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_releases(&self) {
        self.releases.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_refused_releases(&self) {
        self.refused_releases.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn add_promotions(&self, count: u64) {
        self.promotions.fetch_add(count, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_compactions(&self) {
        self.compactions.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn add_rotations(&self, count: u64) {
        if count > 0 {
            self.rotations.fetch_add(count, AtomicOrdering::Relaxed);
        }
    }

    /// Creates a snapshot of all counters.
    pub fn snapshot(&self) -> LockStatsSnapshot {
        LockStatsSnapshot {
            requests: self.requests(),
            added: self.added.load(AtomicOrdering::Relaxed),
            queued: self.queued.load(AtomicOrdering::Relaxed),
            collisions: self.collisions.load(AtomicOrdering::Relaxed),
            pool_exhausted: self.pool_exhausted.load(AtomicOrdering::Relaxed),
            releases: self.releases.load(AtomicOrdering::Relaxed),
            refused_releases: self.refused_releases.load(AtomicOrdering::Relaxed),
            promotions: self.promotions.load(AtomicOrdering::Relaxed),
            compactions: self.compactions(),
            rotations: self.rotations.load(AtomicOrdering::Relaxed),
        }
    }

    /// Emits current counters to the tracing infrastructure.
    pub fn emit_tracing(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            target: "lbalock::stats",
            requests = snapshot.requests,
            added = snapshot.added,
            queued = snapshot.queued,
            collisions = snapshot.collisions,
            pool_exhausted = snapshot.pool_exhausted,
            releases = snapshot.releases,
            refused_releases = snapshot.refused_releases,
            promotions = snapshot.promotions,
            compactions = snapshot.compactions,
            rotations = snapshot.rotations,
            "lock stats snapshot"
        );
    }
}
