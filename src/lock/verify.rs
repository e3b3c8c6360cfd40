//! Structural checks over a namespace tree.
//!
//! Used by tests and the diagnostic driver; never on the request path.

use std::collections::HashSet;
use std::fmt;

use super::node::{NodeRole, Side};
use super::queue;
use super::tree::TreeView;
use crate::types::{LbaRange, NodeId};

/// One broken invariant.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Violation {
    /// Subtree heights differ by more than one.
    Unbalanced {
        /// Slot of the offending node.
        node: NodeId,
        /// `height(right) - height(left)` using measured heights.
        balance: i32,
    },
    /// Stored height label disagrees with the measured height.
    StaleHeight {
        /// Slot of the offending node.
        node: NodeId,
        /// Label stored in the node.
        recorded: i8,
        /// Height measured from the subtree.
        actual: i32,
    },
    /// Two granted ranges share a block, or start LBAs are out of order.
    Overlap {
        /// Earlier node in symmetric order.
        left: NodeId,
        /// Later node in symmetric order.
        right: NodeId,
    },
    /// A pending queue is not sorted by event index.
    QueueOrder {
        /// Host whose queue is out of order.
        host: NodeId,
    },
    /// Two live nodes share an event index.
    DuplicateEvent {
        /// Slot of the second node seen with the index.
        node: NodeId,
    },
    /// Parent link or role tag disagrees with the tree shape.
    Link {
        /// Slot of the offending node.
        node: NodeId,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Unbalanced { node, balance } => {
                write!(f, "node {node} unbalanced ({balance})")
            }
            Violation::StaleHeight {
                node,
                recorded,
                actual,
            } => write!(f, "node {node} height {recorded}, measured {actual}"),
            Violation::Overlap { left, right } => {
                write!(f, "nodes {left} and {right} overlap or are misordered")
            }
            Violation::QueueOrder { host } => write!(f, "queue of node {host} out of order"),
            Violation::DuplicateEvent { node } => write!(f, "node {node} reuses an event index"),
            Violation::Link { node } => write!(f, "node {node} has inconsistent links"),
        }
    }
}

/// Outcome of [`super::LockManager::verify`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VerifyReport {
    /// Granted locks in the namespace.
    pub residents: usize,
    /// Queued requests in the namespace.
    pub queued: usize,
    /// Measured tree height (`-1` when empty).
    pub height: i32,
    /// Every broken invariant found.
    pub violations: Vec<Violation>,
}

impl VerifyReport {
    /// True when no invariant is broken.
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    /// True when no node is out of balance. Stale labels are ignored.
    pub fn is_balanced(&self) -> bool {
        !self
            .violations
            .iter()
            .any(|v| matches!(v, Violation::Unbalanced { .. }))
    }

    /// True when ordering, overlap, queue and link invariants hold; balance
    /// and height labels are not considered.
    pub fn is_consistent(&self) -> bool {
        self.violations.iter().all(|v| {
            matches!(
                v,
                Violation::Unbalanced { .. } | Violation::StaleHeight { .. }
            )
        })
    }
}

struct Checker<'a> {
    view: TreeView<'a>,
    report: VerifyReport,
    previous: Option<(NodeId, LbaRange)>,
}

impl Checker<'_> {
    /// Returns the measured height of the subtree at `id`.
    fn visit(&mut self, id: Option<NodeId>, parent: Option<NodeId>) -> i32 {
        let Some(id) = id else { return -1 };
        let node = self.view.node(id);
        if node.parent != parent || node.role != NodeRole::Resident {
            self.report.violations.push(Violation::Link { node: id });
        }
        for waiter in &node.pending {
            if self.view.node(*waiter).role != (NodeRole::Queued { host: id }) {
                self.report.violations.push(Violation::Link { node: *waiter });
            }
        }

        let left = self.visit(node.child(Side::Left), Some(id));

        if let Some((prev, prev_range)) = self.previous {
            if prev_range.end() >= node.range.start() {
                self.report.violations.push(Violation::Overlap {
                    left: prev,
                    right: id,
                });
            }
        }
        self.previous = Some((id, node.range));
        if !queue::is_ordered(self.view.nodes(), id) {
            self.report.violations.push(Violation::QueueOrder { host: id });
        }
        self.report.residents += 1;
        self.report.queued += node.pending.len();

        let right = self.visit(node.child(Side::Right), Some(id));
        let actual = left.max(right) + 1;
        if i32::from(node.height) != actual {
            self.report.violations.push(Violation::StaleHeight {
                node: id,
                recorded: node.height,
                actual,
            });
        }
        if (right - left).abs() > 1 {
            self.report.violations.push(Violation::Unbalanced {
                node: id,
                balance: right - left,
            });
        }
        actual
    }
}

pub(crate) fn verify_tree(view: TreeView<'_>) -> VerifyReport {
    let mut checker = Checker {
        view,
        report: VerifyReport::default(),
        previous: None,
    };
    checker.report.height = checker.visit(view.root(), None);

    let mut seen = HashSet::new();
    for id in view.live() {
        if !seen.insert(view.node(id).event) {
            checker
                .report
                .violations
                .push(Violation::DuplicateEvent { node: id });
        }
    }
    checker.report
}
