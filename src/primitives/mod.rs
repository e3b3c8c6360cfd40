//! Low-level building blocks for the lock manager.

/// Binary indexed (Fenwick) tree used for rank compaction.
///
/// Supports point updates and prefix-sum queries in logarithmic time.
pub mod fenwick;

pub use fenwick::Fenwick;
