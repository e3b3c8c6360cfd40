//! Pending queues of requests blocked behind a granted lock.
//!
//! Each resident node owns a queue of waiters ordered by ascending event
//! index. Queue depth is bounded by contention on the host's range, so
//! insertion uses a plain linear scan.

use super::node::{LockNode, NodeRole, PendingQueue};
use crate::types::NodeId;

/// Places `waiter` into the queue of `host`, before the first entry with a
/// larger event index.
pub(crate) fn enqueue(nodes: &mut [LockNode], host: NodeId, waiter: NodeId) {
    let event = nodes[waiter.slot()].event;
    let position = nodes[host.slot()]
        .pending
        .iter()
        .position(|queued| nodes[queued.slot()].event > event);
    let queue = &mut nodes[host.slot()].pending;
    match position {
        Some(idx) => queue.insert(idx, waiter),
        None => queue.push(waiter),
    }
    nodes[waiter.slot()].role = NodeRole::Queued { host };
}

/// Empties the queue of `host`, returning the waiters in stored order.
///
/// Returned nodes are detached: no role, no structural links.
pub(crate) fn drain(nodes: &mut [LockNode], host: NodeId) -> PendingQueue {
    let waiters = std::mem::take(&mut nodes[host.slot()].pending);
    for waiter in &waiters {
        let node = &mut nodes[waiter.slot()];
        node.unlink();
        node.pending.clear();
        node.role = NodeRole::Detached;
    }
    waiters
}

/// True when event indices along the queue never decrease.
pub(crate) fn is_ordered(nodes: &[LockNode], host: NodeId) -> bool {
    nodes[host.slot()]
        .pending
        .windows(2)
        .all(|pair| nodes[pair[0].slot()].event <= nodes[pair[1].slot()].event)
}
