use std::fmt;

use super::node::Side;
use super::tree::TreeView;
use crate::types::{NamespaceId, NodeId};

/// Human-readable listing of one namespace: every granted lock in pre-order
/// with its range, height and kind, followed by its pending queue.
///
/// Intended for tests and debugging; the format is not stable.
pub struct TreeDump<'a> {
    namespace: NamespaceId,
    view: TreeView<'a>,
}

impl<'a> TreeDump<'a> {
    pub(crate) fn new(namespace: NamespaceId, view: TreeView<'a>) -> Self {
        Self { namespace, view }
    }

    fn write_node(
        &self,
        f: &mut fmt::Formatter<'_>,
        id: NodeId,
        depth: usize,
        tag: &str,
    ) -> fmt::Result {
        let node = self.view.node(id);
        let indent = "  ".repeat(depth);
        writeln!(
            f,
            "{indent}{tag}#{} {} h{} {}",
            node.event, node.range, node.height, node.kind
        )?;
        for waiter in &node.pending {
            let waiter = self.view.node(*waiter);
            writeln!(
                f,
                "{indent}    pending #{} {} {}",
                waiter.event, waiter.range, waiter.kind
            )?;
        }
        if let Some(left) = node.child(Side::Left) {
            self.write_node(f, left, depth + 1, "L ")?;
        }
        if let Some(right) = node.child(Side::Right) {
            self.write_node(f, right, depth + 1, "R ")?;
        }
        Ok(())
    }
}

impl fmt::Display for TreeDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let granted = self.view.residents().count();
        let queued = self.view.live().count() - granted;
        writeln!(
            f,
            "namespace {}: {granted} granted, {queued} queued",
            self.namespace
        )?;
        match self.view.root() {
            Some(root) => self.write_node(f, root, 0, ""),
            None => writeln!(f, "(empty)"),
        }
    }
}
