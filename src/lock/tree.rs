//! Interval AVL tree over granted LBA ranges.
//!
//! Nodes live in the pool arena and are linked by [`NodeId`]. Resident ranges
//! never overlap, so ordering by start LBA is total among residents. Each
//! resident may carry a pending queue of waiters whose ranges collided with
//! it (or with one of its waiters) on their way down.

use tracing::trace;

use super::node::{LockNode, NodeRole, Side};
use super::options::RemovalBalance;
use super::queue;
use crate::types::{LbaRange, NodeId};

/// Result of offering a detached node to a tree.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum InsertOutcome {
    /// Linked into the tree; the lock is granted.
    Added,
    /// Appended to the pending queue of `host`.
    Queued { host: NodeId },
    /// Overlaps `holder` (resident or queued) and queueing was not allowed.
    /// Nothing was changed.
    Collision { holder: NodeId },
}

/// Read-only view over one namespace tree.
#[derive(Copy, Clone)]
pub(crate) struct TreeView<'a> {
    nodes: &'a [LockNode],
    root: Option<NodeId>,
}

impl<'a> TreeView<'a> {
    pub(crate) fn new(nodes: &'a [LockNode], root: Option<NodeId>) -> Self {
        Self { nodes, root }
    }

    pub(crate) fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn nodes(&self) -> &'a [LockNode] {
        self.nodes
    }

    pub(crate) fn node(&self, id: NodeId) -> &'a LockNode {
        &self.nodes[id.slot()]
    }

    pub(crate) fn height(&self, id: Option<NodeId>) -> i8 {
        id.map_or(-1, |id| self.nodes[id.slot()].height)
    }

    /// Height implied by the children's labels.
    pub(crate) fn fresh_height(&self, id: NodeId) -> i8 {
        let node = self.node(id);
        self.height(node.child(Side::Left))
            .max(self.height(node.child(Side::Right)))
            + 1
    }

    /// `height(right) - height(left)`.
    pub(crate) fn balance(&self, id: NodeId) -> i8 {
        let node = self.node(id);
        self.height(node.child(Side::Right)) - self.height(node.child(Side::Left))
    }

    /// First of `at` or its waiters that overlaps `range`.
    fn conflict_at(&self, at: NodeId, range: &LbaRange) -> Option<NodeId> {
        let node = self.node(at);
        if node.range.overlaps(range) {
            return Some(at);
        }
        node.pending
            .iter()
            .copied()
            .find(|queued| self.node(*queued).range.overlaps(range))
    }

    /// Whether `target` is linked into the tree, ignoring pending queues.
    ///
    /// Follows the search path for the target's start LBA.
    pub(crate) fn contains_resident(&self, target: NodeId) -> bool {
        let Some(wanted) = self.nodes.get(target.slot()) else {
            return false;
        };
        let start = wanted.range.start();
        let mut cursor = self.root;
        while let Some(id) = cursor {
            if id == target {
                return true;
            }
            let node = self.node(id);
            cursor = if node.range.start() < start {
                node.child(Side::Right)
            } else {
                node.child(Side::Left)
            };
        }
        false
    }

    /// Whether `target` is resident or waiting in any pending queue.
    pub(crate) fn contains_with_pending(&self, target: NodeId) -> bool {
        self.live().any(|id| id == target)
    }

    /// Resident nodes in pre-order.
    pub(crate) fn residents(&self) -> Preorder<'a> {
        Preorder {
            nodes: self.nodes,
            stack: self.root.into_iter().collect(),
        }
    }

    /// Every resident followed by its pending queue, in pre-order.
    pub(crate) fn live(&self) -> impl Iterator<Item = NodeId> + 'a {
        let nodes = self.nodes;
        self.residents()
            .flat_map(move |id| std::iter::once(id).chain(nodes[id.slot()].pending.iter().copied()))
    }
}

/// Pre-order walk over resident nodes.
pub(crate) struct Preorder<'a> {
    nodes: &'a [LockNode],
    stack: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let node = &self.nodes[id.slot()];
        if let Some(right) = node.child(Side::Right) {
            self.stack.push(right);
        }
        if let Some(left) = node.child(Side::Left) {
            self.stack.push(left);
        }
        Some(id)
    }
}

/// Mutable handle over one namespace tree.
pub(crate) struct Tree<'a> {
    nodes: &'a mut [LockNode],
    root: &'a mut Option<NodeId>,
    rotations: u64,
}

impl<'a> Tree<'a> {
    pub(crate) fn new(nodes: &'a mut [LockNode], root: &'a mut Option<NodeId>) -> Self {
        Self {
            nodes,
            root,
            rotations: 0,
        }
    }

    /// Rotations performed through this handle so far.
    pub(crate) fn rotations(&self) -> u64 {
        self.rotations
    }

    fn view(&self) -> TreeView<'_> {
        TreeView::new(&*self.nodes, *self.root)
    }

    fn child(&self, id: NodeId, side: Side) -> Option<NodeId> {
        self.nodes[id.slot()].child(side)
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.slot()].parent
    }

    fn height_of(&self, id: Option<NodeId>) -> i8 {
        self.view().height(id)
    }

    /// Offers the detached node `id` to the tree.
    ///
    /// The walk checks each visited resident and its waiters for overlap. On a
    /// hit the node joins that resident's queue when `allow_queue` is set.
    /// Otherwise it descends by start LBA (ties go left) and is attached as a
    /// leaf, followed by at most one rebalancing rotation.
    pub(crate) fn insert(&mut self, id: NodeId, allow_queue: bool) -> InsertOutcome {
        let range = self.nodes[id.slot()].range;
        let Some(mut cursor) = *self.root else {
            self.link_leaf(id, None);
            *self.root = Some(id);
            return InsertOutcome::Added;
        };
        loop {
            if let Some(holder) = self.view().conflict_at(cursor, &range) {
                if !allow_queue {
                    trace!(slot = id.0, holder = holder.0, "tree.insert collision");
                    return InsertOutcome::Collision { holder };
                }
                queue::enqueue(&mut *self.nodes, cursor, id);
                trace!(slot = id.0, host = cursor.0, "tree.insert queued");
                return InsertOutcome::Queued { host: cursor };
            }
            let side = if range.start() > self.nodes[cursor.slot()].range.start() {
                Side::Right
            } else {
                Side::Left
            };
            match self.child(cursor, side) {
                Some(next) => cursor = next,
                None => {
                    self.nodes[cursor.slot()].set_child(side, Some(id));
                    self.link_leaf(id, Some(cursor));
                    self.rebalance_after_insert(cursor);
                    return InsertOutcome::Added;
                }
            }
        }
    }

    /// Re-submits a former waiter with queueing allowed. Returns true when it
    /// was granted, false when it joined another pending queue.
    pub(crate) fn promote(&mut self, id: NodeId) -> bool {
        let outcome = self.insert(id, true);
        debug_assert!(!matches!(outcome, InsertOutcome::Collision { .. }));
        outcome == InsertOutcome::Added
    }

    fn link_leaf(&mut self, id: NodeId, parent: Option<NodeId>) {
        let node = &mut self.nodes[id.slot()];
        node.unlink();
        node.parent = parent;
        node.role = NodeRole::Resident;
    }

    /// Walks up from `start` refreshing heights. Stops at the first unchanged
    /// height or after the first rotation, which restores balance for every
    /// ancestor above it.
    fn rebalance_after_insert(&mut self, start: NodeId) {
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let fresh = self.view().fresh_height(id);
            if fresh == self.nodes[id.slot()].height {
                break;
            }
            self.nodes[id.slot()].height = fresh;
            let balance = self.view().balance(id);
            if balance.abs() >= 2 {
                self.restore(id, balance);
                break;
            }
            cursor = self.parent(id);
        }
    }

    /// Rotates the unbalanced subtree rooted at `id`, returning its new root.
    ///
    /// A single rotation suffices when the heavy child's outer grandchild is at
    /// least as tall as its inner one; otherwise a double rotation is used.
    fn restore(&mut self, id: NodeId, balance: i8) -> NodeId {
        let heavy = if balance > 0 { Side::Right } else { Side::Left };
        let Some(child) = self.child(id, heavy) else {
            return id;
        };
        let outer = self.height_of(self.child(child, heavy));
        let inner = self.height_of(self.child(child, heavy.opposite()));
        if outer >= inner {
            self.rotate(id, heavy.opposite())
        } else {
            self.rotate_double(id, heavy.opposite())
        }
    }

    /// Rotates `sub` towards `direction`; its child on the opposite side
    /// becomes the subtree root.
    fn rotate(&mut self, sub: NodeId, direction: Side) -> NodeId {
        let Some(pivot) = self.child(sub, direction.opposite()) else {
            return sub;
        };
        let inner = self.child(pivot, direction);
        self.nodes[sub.slot()].set_child(direction.opposite(), inner);
        if let Some(inner) = inner {
            self.nodes[inner.slot()].parent = Some(sub);
        }
        self.nodes[pivot.slot()].set_child(direction, Some(sub));

        let parent = self.parent(sub);
        self.nodes[pivot.slot()].parent = parent;
        self.nodes[sub.slot()].parent = Some(pivot);
        self.replace_in_parent(parent, sub, Some(pivot));

        self.nodes[sub.slot()].height = self.view().fresh_height(sub);
        self.nodes[pivot.slot()].height = self.view().fresh_height(pivot);
        self.rotations += 1;
        pivot
    }

    fn rotate_double(&mut self, sub: NodeId, direction: Side) -> NodeId {
        if let Some(child) = self.child(sub, direction.opposite()) {
            self.rotate(child, direction.opposite());
        }
        self.rotate(sub, direction)
    }

    fn replace_in_parent(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            Some(parent) => {
                let side = if self.child(parent, Side::Right) == Some(old) {
                    Side::Right
                } else {
                    Side::Left
                };
                self.nodes[parent.slot()].set_child(side, new);
            }
            None => *self.root = new,
        }
    }

    /// Unlinks the resident node `id` from the tree.
    ///
    /// The node's pending queue is left intact for the caller to promote.
    pub(crate) fn remove(&mut self, id: NodeId, balance: RemovalBalance) {
        let retrace_from = self.detach(id);
        if balance == RemovalBalance::Retrace {
            if let Some(start) = retrace_from {
                self.retrace(start);
            }
        }
        let node = &mut self.nodes[id.slot()];
        node.unlink();
        node.role = NodeRole::Detached;
    }

    /// Structural removal. Returns the deepest node whose subtree shrank.
    fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id);
        match (self.child(id, Side::Left), self.child(id, Side::Right)) {
            (Some(left), Some(right)) => {
                let replace = self.predecessor(left);
                let replace_parent = self.parent(replace);
                self.detach(replace);

                let left = self.child(id, Side::Left);
                self.nodes[replace.slot()].set_child(Side::Left, left);
                if let Some(left) = left {
                    self.nodes[left.slot()].parent = Some(replace);
                }
                self.nodes[replace.slot()].set_child(Side::Right, Some(right));
                self.nodes[right.slot()].parent = Some(replace);

                self.nodes[replace.slot()].parent = parent;
                self.replace_in_parent(parent, id, Some(replace));
                self.nodes[replace.slot()].height = self.nodes[id.slot()].height;

                if replace_parent == Some(id) {
                    Some(replace)
                } else {
                    replace_parent
                }
            }
            (Some(child), None) | (None, Some(child)) => {
                self.nodes[child.slot()].parent = parent;
                self.replace_in_parent(parent, id, Some(child));
                parent
            }
            (None, None) => {
                self.replace_in_parent(parent, id, None);
                parent
            }
        }
    }

    /// Rightmost node of the subtree rooted at `from`.
    fn predecessor(&self, from: NodeId) -> NodeId {
        let mut cursor = from;
        while let Some(right) = self.child(cursor, Side::Right) {
            cursor = right;
        }
        cursor
    }

    /// Refreshes heights from `start` to the root, rotating every node whose
    /// balance reached two.
    fn retrace(&mut self, start: NodeId) {
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            self.nodes[id.slot()].height = self.view().fresh_height(id);
            let balance = self.view().balance(id);
            let top = if balance.abs() >= 2 {
                self.restore(id, balance)
            } else {
                id
            };
            cursor = self.parent(top);
        }
    }
}
