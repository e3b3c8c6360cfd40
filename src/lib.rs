//! In-process range lock manager for block-addressable storage.
//!
//! [`LockManager`] decides, per request, whether an LBA range is free, must
//! wait behind an existing holder, or conflicts and is rejected. It performs
//! no I/O and never blocks; callers serialize access per manager.
//!
//! ```
//! use lbalock::{LockKind, LockManager, LockOutcome, NamespaceId};
//!
//! let mut locks = LockManager::default();
//! let ns = NamespaceId(0);
//! let held = locks.lock_request(0, 63, LockKind::Write, true, ns).unwrap();
//! let waiting = locks.lock_request(32, 40, LockKind::Read, true, ns).unwrap();
//! assert!(matches!(waiting, LockOutcome::Queued(_)));
//!
//! let summary = locks.lock_release(held.handle().unwrap(), ns).unwrap();
//! assert_eq!(summary.granted().count(), 1);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod lock;
pub mod primitives;
pub mod types;

pub use error::{LockError, ReleaseRefusal, Result};
pub use lock::{
    LockHandle, LockManager, LockManagerOptions, LockOutcome, LockState, LockStats,
    LockStatsSnapshot, Promotion, ReleaseSummary, RemovalBalance, SharedLockManager, TreeDump,
    VerifyReport, Violation,
};
pub use types::{EventIndex, LbaRange, LockKind, NamespaceId, NodeId};
