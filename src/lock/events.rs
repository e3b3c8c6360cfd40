//! Event-index issuance with order-preserving compaction.
//!
//! Each namespace hands out strictly increasing indices. Before the counter
//! would reach the pool capacity, every live index of the namespace is ranked
//! through a Fenwick tree and renumbered densely into `1..=live`, keeping the
//! relative order that pending queues depend on.

use tracing::debug;

use super::node::LockNode;
use super::tree::TreeView;
use crate::primitives::Fenwick;
use crate::types::{EventIndex, NamespaceId, NodeId};

/// Index handed out by [`EventAllocator::issue`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Issued {
    pub(crate) index: EventIndex,
    pub(crate) compacted: bool,
}

/// Shared rank scratch space plus the issuance limit.
#[derive(Debug)]
pub(crate) struct EventAllocator {
    ranks: Fenwick,
    limit: u32,
}

impl EventAllocator {
    pub(crate) fn new(limit: u32) -> Self {
        Self {
            ranks: Fenwick::with_capacity(limit as usize),
            limit,
        }
    }

    /// Issues the next index for a namespace whose counter is `counter` and
    /// whose live nodes hang off `root`.
    pub(crate) fn issue(
        &mut self,
        namespace: NamespaceId,
        counter: &mut u32,
        nodes: &mut [LockNode],
        root: Option<NodeId>,
    ) -> Issued {
        let compacted = counter.saturating_add(1) >= self.limit;
        if compacted {
            let before = *counter;
            *counter = self.compact(nodes, root);
            debug!(
                namespace = namespace.0,
                before,
                after = *counter,
                "events.compact"
            );
        }
        *counter += 1;
        Issued {
            index: EventIndex(*counter),
            compacted,
        }
    }

    /// Renumbers every live index under `root` to its rank and returns the
    /// number of live nodes.
    fn compact(&mut self, nodes: &mut [LockNode], root: Option<NodeId>) -> u32 {
        self.ranks.clear();
        let live: Vec<NodeId> = TreeView::new(nodes, root).live().collect();
        for id in &live {
            self.ranks.add(nodes[id.slot()].event.0 as usize, 1);
        }
        for id in &live {
            let node = &mut nodes[id.slot()];
            node.event = EventIndex(self.ranks.prefix_sum(node.event.0 as usize));
        }
        self.ranks.prefix_sum(self.limit as usize)
    }
}
