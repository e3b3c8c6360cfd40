use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::dump::TreeDump;
use super::events::EventAllocator;
use super::node::{LockNode, NodeRole};
use super::options::LockManagerOptions;
use super::pool::NodePool;
use super::queue;
use super::stats::LockStats;
use super::tree::{InsertOutcome, Tree, TreeView};
use super::verify::{self, VerifyReport};
use crate::error::{LockError, ReleaseRefusal, Result};
use crate::types::{EventIndex, LbaRange, LockKind, NamespaceId, NodeId};

/// Reference to a submitted lock request.
///
/// Handles stay valid until the lock is released. A handle whose slot has
/// since been recycled no longer resolves.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct LockHandle {
    node: NodeId,
    generation: u32,
}

impl LockHandle {
    /// Pool slot backing this request.
    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// Result of [`LockManager::lock_request`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LockOutcome {
    /// The range was free; the lock is granted.
    Added(LockHandle),
    /// The range is contested; the request waits behind an existing lock.
    Queued(LockHandle),
    /// The range is contested and queueing was not allowed. Nothing changed.
    Collision,
}

impl LockOutcome {
    /// Handle of the admitted request, if any.
    pub fn handle(&self) -> Option<LockHandle> {
        match self {
            LockOutcome::Added(handle) | LockOutcome::Queued(handle) => Some(*handle),
            LockOutcome::Collision => None,
        }
    }

    /// Whether the request was granted immediately.
    pub fn is_added(&self) -> bool {
        matches!(self, LockOutcome::Added(_))
    }

    /// Whether the request was queued.
    pub fn is_queued(&self) -> bool {
        matches!(self, LockOutcome::Queued(_))
    }
}

/// Current standing of a live request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LockState {
    /// Linked into its namespace tree.
    Granted,
    /// Waiting in a pending queue.
    Pending,
}

/// One waiter re-submitted during a release.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Promotion {
    /// The waiter that was re-submitted.
    pub handle: LockHandle,
    /// Where it landed.
    pub state: LockState,
}

/// What a successful release changed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReleaseSummary {
    /// Former waiters of the released lock, in promotion order.
    pub promoted: SmallVec<[Promotion; 4]>,
}

impl ReleaseSummary {
    /// Handles that became granted because of this release.
    pub fn granted(&self) -> impl Iterator<Item = LockHandle> + '_ {
        self.promoted
            .iter()
            .filter(|p| p.state == LockState::Granted)
            .map(|p| p.handle)
    }
}

#[derive(Debug, Default)]
struct Namespace {
    root: Option<NodeId>,
    next_event: u32,
}

/// Range lock manager over LBA intervals, partitioned into namespaces.
///
/// All operations are synchronous and take `&mut self`; callers that share a
/// manager across threads must serialize access (see
/// [`super::SharedLockManager`]).
#[derive(Debug)]
pub struct LockManager {
    options: LockManagerOptions,
    pool: NodePool,
    namespaces: Vec<Namespace>,
    events: EventAllocator,
    stats: LockStats,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::build(LockManagerOptions::default())
    }
}

impl LockManager {
    /// Creates a manager with every namespace empty and the pool full.
    pub fn new(options: LockManagerOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::build(options))
    }

    fn build(options: LockManagerOptions) -> Self {
        let mut namespaces = Vec::with_capacity(options.max_namespaces as usize);
        namespaces.resize_with(options.max_namespaces as usize, Namespace::default);
        Self {
            pool: NodePool::with_capacity(options.max_nodes),
            events: EventAllocator::new(options.max_nodes),
            namespaces,
            stats: LockStats::default(),
            options,
        }
    }

    /// Drops every lock in every namespace and refills the pool.
    ///
    /// Outstanding handles stop resolving.
    pub fn initialize(&mut self) {
        self.pool.reset();
        for ns in &mut self.namespaces {
            *ns = Namespace::default();
        }
        debug!(
            max_nodes = self.options.max_nodes,
            max_namespaces = self.options.max_namespaces,
            "lock.initialize"
        );
    }

    /// Options the manager was built with.
    pub fn options(&self) -> &LockManagerOptions {
        &self.options
    }

    /// Activity counters.
    pub fn stats(&self) -> &LockStats {
        &self.stats
    }

    /// Requests a lock over `start..=end` in `namespace`.
    ///
    /// Returns [`LockOutcome::Collision`] when the range is contested and
    /// `allow_queue` is false, and [`LockError::PoolExhausted`] when no node
    /// slot is free. Neither case changes any lock state.
    pub fn lock_request(
        &mut self,
        start: u64,
        end: u64,
        kind: LockKind,
        allow_queue: bool,
        namespace: NamespaceId,
    ) -> Result<LockOutcome> {
        let ns_idx = self.namespace_index(namespace)?;
        let range = LbaRange::new(start, end).ok_or(LockError::InvalidRange { start, end })?;
        self.stats.inc_requests();

        let Some(id) = self.pool.acquire() else {
            self.stats.inc_pool_exhausted();
            warn!(namespace = namespace.0, start, end, "lock.request pool exhausted");
            return Err(LockError::PoolExhausted);
        };
        {
            let node = &mut self.pool.nodes_mut()[id.slot()];
            node.range = range;
            node.kind = kind;
            node.namespace = namespace;
        }

        let ns = &mut self.namespaces[ns_idx];
        let issued = self
            .events
            .issue(namespace, &mut ns.next_event, self.pool.nodes_mut(), ns.root);
        if issued.compacted {
            self.stats.inc_compactions();
        }
        self.pool.nodes_mut()[id.slot()].event = issued.index;

        let mut tree = Tree::new(self.pool.nodes_mut(), &mut ns.root);
        let outcome = tree.insert(id, allow_queue);
        self.stats.add_rotations(tree.rotations());

        let handle = self.handle_for(id);
        trace!(
            namespace = namespace.0,
            slot = id.0,
            event = issued.index.0,
            %range,
            %kind,
            ?outcome,
            "lock.request"
        );
        match outcome {
            InsertOutcome::Added => {
                self.stats.inc_added();
                Ok(LockOutcome::Added(handle))
            }
            InsertOutcome::Queued { host } => {
                self.stats.inc_queued();
                debug!(namespace = namespace.0, slot = id.0, host = host.0, "lock.request queued");
                Ok(LockOutcome::Queued(handle))
            }
            InsertOutcome::Collision { holder } => {
                debug!(namespace = namespace.0, %range, holder = holder.0, "lock.request collision");
                self.namespaces[ns_idx].next_event -= 1;
                self.pool.release(id);
                self.stats.inc_collisions();
                Ok(LockOutcome::Collision)
            }
        }
    }

    /// Releases a granted lock and re-submits every request queued behind it.
    ///
    /// Releasing a request that is only queued, or that is not live in
    /// `namespace`, is refused with [`LockError::InvalidRelease`] and changes
    /// nothing.
    pub fn lock_release(
        &mut self,
        handle: LockHandle,
        namespace: NamespaceId,
    ) -> Result<ReleaseSummary> {
        let ns_idx = self.namespace_index(namespace)?;
        let id = handle.node;
        let refusal = {
            let view = TreeView::new(self.pool.nodes(), self.namespaces[ns_idx].root);
            if self.resolve(handle).is_none() || !view.contains_with_pending(id) {
                Some(ReleaseRefusal::NotFound)
            } else if !view.contains_resident(id) {
                Some(ReleaseRefusal::Pending)
            } else {
                None
            }
        };
        if let Some(reason) = refusal {
            self.stats.inc_refused_releases();
            warn!(namespace = namespace.0, slot = id.0, %reason, "lock.release refused");
            return Err(LockError::InvalidRelease { reason });
        }

        let balance = self.options.removal_balance;
        let ns = &mut self.namespaces[ns_idx];
        let mut rotations = {
            let mut tree = Tree::new(self.pool.nodes_mut(), &mut ns.root);
            tree.remove(id, balance);
            tree.rotations()
        };
        let waiters = queue::drain(self.pool.nodes_mut(), id);

        let mut placements: SmallVec<[(NodeId, LockState); 4]> = SmallVec::new();
        {
            let mut tree = Tree::new(self.pool.nodes_mut(), &mut ns.root);
            for waiter in waiters {
                let state = if tree.promote(waiter) {
                    LockState::Granted
                } else {
                    LockState::Pending
                };
                placements.push((waiter, state));
            }
            rotations += tree.rotations();
        }
        self.pool.release(id);

        let promoted: SmallVec<[Promotion; 4]> = placements
            .into_iter()
            .map(|(node, state)| Promotion {
                handle: self.handle_for(node),
                state,
            })
            .collect();
        self.stats.inc_releases();
        self.stats.add_promotions(promoted.len() as u64);
        self.stats.add_rotations(rotations);
        debug!(
            namespace = namespace.0,
            slot = id.0,
            promoted = promoted.len(),
            "lock.release"
        );
        Ok(ReleaseSummary { promoted })
    }

    /// Whether `handle` is granted, pending, or no longer live.
    pub fn state(&self, handle: LockHandle) -> Option<LockState> {
        match self.resolve(handle)?.role {
            NodeRole::Resident => Some(LockState::Granted),
            NodeRole::Queued { .. } => Some(LockState::Pending),
            NodeRole::Free | NodeRole::Detached => None,
        }
    }

    /// Range covered by a live request.
    pub fn range(&self, handle: LockHandle) -> Option<LbaRange> {
        self.resolve(handle).map(|node| node.range)
    }

    /// Access mode of a live request.
    pub fn kind(&self, handle: LockHandle) -> Option<LockKind> {
        self.resolve(handle).map(|node| node.kind)
    }

    /// Current ordering token of a live request.
    ///
    /// Values may be renumbered by compaction; only their relative order
    /// within a namespace is meaningful.
    pub fn event_index(&self, handle: LockHandle) -> Option<EventIndex> {
        self.resolve(handle).map(|node| node.event)
    }

    /// Namespace a live request belongs to.
    pub fn namespace_of(&self, handle: LockHandle) -> Option<NamespaceId> {
        self.resolve(handle).map(|node| node.namespace)
    }

    /// Number of granted locks in `namespace`.
    pub fn resident_count(&self, namespace: NamespaceId) -> Result<usize> {
        Ok(self.view(namespace)?.residents().count())
    }

    /// Number of queued requests in `namespace`.
    pub fn queued_count(&self, namespace: NamespaceId) -> Result<usize> {
        let view = self.view(namespace)?;
        Ok(view
            .residents()
            .map(|id| view.node(id).pending.len())
            .sum())
    }

    /// Granted locks of `namespace`, each with its queued waiters in order.
    pub fn holders(&self, namespace: NamespaceId) -> Result<Vec<(LockHandle, Vec<LockHandle>)>> {
        let view = self.view(namespace)?;
        Ok(view
            .residents()
            .map(|id| {
                let waiters = view
                    .node(id)
                    .pending
                    .iter()
                    .map(|waiter| self.handle_for(*waiter))
                    .collect();
                (self.handle_for(id), waiters)
            })
            .collect())
    }

    /// Checked-out nodes across all namespaces.
    pub fn live_count(&self) -> usize {
        self.pool.live()
    }

    /// Total pool capacity.
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Human-readable listing of the namespace tree and its queues.
    pub fn dump(&self, namespace: NamespaceId) -> Result<TreeDump<'_>> {
        Ok(TreeDump::new(namespace, self.view(namespace)?))
    }

    /// Checks balance, ordering, overlap and queue invariants of a namespace.
    pub fn verify(&self, namespace: NamespaceId) -> Result<VerifyReport> {
        Ok(verify::verify_tree(self.view(namespace)?))
    }

    fn namespace_index(&self, namespace: NamespaceId) -> Result<usize> {
        let idx = namespace.0 as usize;
        if idx < self.namespaces.len() {
            Ok(idx)
        } else {
            Err(LockError::InvalidNamespace(namespace.0))
        }
    }

    fn view(&self, namespace: NamespaceId) -> Result<TreeView<'_>> {
        let idx = self.namespace_index(namespace)?;
        Ok(TreeView::new(self.pool.nodes(), self.namespaces[idx].root))
    }

    fn handle_for(&self, id: NodeId) -> LockHandle {
        let generation = self.pool.get(id).map_or(0, |node| node.generation);
        LockHandle {
            node: id,
            generation,
        }
    }

    fn resolve(&self, handle: LockHandle) -> Option<&LockNode> {
        self.pool
            .get(handle.node)
            .filter(|node| node.generation == handle.generation)
            .filter(|node| !matches!(node.role, NodeRole::Free | NodeRole::Detached))
    }
}
