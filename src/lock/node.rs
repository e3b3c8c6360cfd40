use smallvec::SmallVec;

use crate::types::{EventIndex, LbaRange, LockKind, NamespaceId, NodeId};

/// Pending queues rarely grow past a handful of waiters.
pub(crate) type PendingQueue = SmallVec<[NodeId; 4]>;

/// Child slot of a tree node.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Side {
    Left = 0,
    Right = 1,
}

impl Side {
    pub(crate) fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// What currently owns a node slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum NodeRole {
    /// Sitting in the pool's free collection.
    Free,
    /// Checked out but not yet placed in a tree or queue.
    Detached,
    /// Granted: linked into a namespace tree.
    Resident,
    /// Waiting in the pending queue of `host`.
    Queued { host: NodeId },
}

/// One lock request slot in the arena.
#[derive(Clone, Debug)]
pub(crate) struct LockNode {
    pub(crate) range: LbaRange,
    pub(crate) kind: LockKind,
    pub(crate) namespace: NamespaceId,
    pub(crate) event: EventIndex,
    pub(crate) height: i8,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: [Option<NodeId>; 2],
    pub(crate) pending: PendingQueue,
    pub(crate) role: NodeRole,
    pub(crate) generation: u32,
}

impl LockNode {
    pub(crate) fn vacant() -> Self {
        Self {
            range: LbaRange::single(0),
            kind: LockKind::Read,
            namespace: NamespaceId(0),
            event: EventIndex(0),
            height: 0,
            parent: None,
            children: [None, None],
            pending: PendingQueue::new(),
            role: NodeRole::Free,
            generation: 0,
        }
    }

    pub(crate) fn child(&self, side: Side) -> Option<NodeId> {
        self.children[side as usize]
    }

    pub(crate) fn set_child(&mut self, side: Side, child: Option<NodeId>) {
        self.children[side as usize] = child;
    }

    /// Drops structural links so the node can be reinserted from scratch.
    pub(crate) fn unlink(&mut self) {
        self.parent = None;
        self.children = [None, None];
        self.height = 0;
    }
}
