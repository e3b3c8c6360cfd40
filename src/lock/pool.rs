use std::collections::VecDeque;

use tracing::trace;

use super::node::{LockNode, NodeRole, PendingQueue};
use crate::types::NodeId;

/// Fixed-capacity arena of lock nodes with a free collection.
///
/// Slots are handed out from the front of the free collection and returned to
/// the back, so a released slot is the last to be reused.
#[derive(Debug)]
pub(crate) struct NodePool {
    nodes: Vec<LockNode>,
    free: VecDeque<NodeId>,
}

impl NodePool {
    pub(crate) fn with_capacity(capacity: u32) -> Self {
        let mut pool = Self {
            nodes: Vec::with_capacity(capacity as usize),
            free: VecDeque::with_capacity(capacity as usize),
        };
        pool.nodes.resize_with(capacity as usize, LockNode::vacant);
        pool.reset();
        pool
    }

    /// Returns every slot to the free collection, keeping slot generations.
    pub(crate) fn reset(&mut self) {
        self.free.clear();
        for (idx, node) in self.nodes.iter_mut().enumerate() {
            if node.role != NodeRole::Free {
                node.generation = node.generation.wrapping_add(1);
            }
            let generation = node.generation;
            *node = LockNode::vacant();
            node.generation = generation;
            self.free.push_back(NodeId(idx as u32));
        }
    }

    pub(crate) fn acquire(&mut self) -> Option<NodeId> {
        let id = self.free.pop_front()?;
        let node = &mut self.nodes[id.slot()];
        debug_assert_eq!(node.role, NodeRole::Free);
        node.role = NodeRole::Detached;
        trace!(slot = id.0, live = self.live(), "pool.acquire");
        Some(id)
    }

    pub(crate) fn release(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.slot()];
        debug_assert_ne!(node.role, NodeRole::Free, "double release of slot {id}");
        if node.role == NodeRole::Free {
            return;
        }
        node.unlink();
        node.pending = PendingQueue::new();
        node.role = NodeRole::Free;
        node.generation = node.generation.wrapping_add(1);
        self.free.push_back(id);
        trace!(slot = id.0, live = self.live(), "pool.release");
    }

    pub(crate) fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn available(&self) -> usize {
        self.free.len()
    }

    pub(crate) fn live(&self) -> usize {
        self.capacity() - self.available()
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&LockNode> {
        self.nodes.get(id.slot())
    }

    pub(crate) fn nodes(&self) -> &[LockNode] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [LockNode] {
        &mut self.nodes
    }
}
