//! Range lock manager over logical block address intervals.
//!
//! Each namespace owns an interval AVL tree of granted locks. Requests that
//! overlap a granted lock either wait in that lock's pending queue or are
//! rejected, and releasing a lock re-submits its waiters in arrival order.
//! All nodes come from one fixed-capacity pool shared by every namespace.

mod dump;
mod events;
mod manager;
mod node;
mod options;
mod pool;
mod queue;
mod shared;
mod stats;
mod tree;
mod verify;

pub use dump::TreeDump;
pub use manager::{
    LockHandle, LockManager, LockOutcome, LockState, Promotion, ReleaseSummary,
};
pub use options::{LockManagerOptions, RemovalBalance, DEFAULT_MAX_NAMESPACES, DEFAULT_MAX_NODES};
pub use shared::SharedLockManager;
pub use stats::{LockStats, LockStatsSnapshot};
pub use verify::{VerifyReport, Violation};
