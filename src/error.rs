use std::fmt;

use thiserror::Error;

/// Result alias used throughout the lock manager.
pub type Result<T> = std::result::Result<T, LockError>;

/// Why a release request was refused.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReleaseRefusal {
    /// The handle does not name a live node in the namespace.
    NotFound,
    /// The node is live but still waiting in a pending queue.
    Pending,
}

impl fmt::Display for ReleaseRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseRefusal::NotFound => f.write_str("lock is not held in this namespace"),
            ReleaseRefusal::Pending => f.write_str("lock is still pending"),
        }
    }
}

/// Errors reported by the lock manager.
#[derive(Debug, Error)]
pub enum LockError {
    /// Every node slot in the pool is checked out.
    #[error("lock node pool exhausted")]
    PoolExhausted,
    /// A release targeted a lock that is not currently granted.
    #[error("invalid release: {reason}")]
    InvalidRelease {
        /// The validation step that refused the release.
        reason: ReleaseRefusal,
    },
    /// The namespace id is outside the configured range.
    #[error("namespace {0} out of range")]
    InvalidNamespace(u32),
    /// The range end precedes its start.
    #[error("invalid range [{start}, {end}]")]
    InvalidRange {
        /// First LBA of the rejected range.
        start: u64,
        /// Last LBA of the rejected range.
        end: u64,
    },
    /// Options failed to parse or validate.
    #[error("config: {0}")]
    Config(String),
}
