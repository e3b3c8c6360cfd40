//! Identifiers and value types shared by the lock manager.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a node slot inside the pool arena.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct NodeId(pub u32);

/// Identifier of an independent locking domain.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct NamespaceId(pub u32);

/// Per-namespace ordering token assigned to each admitted request.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct EventIndex(pub u32);

impl NodeId {
    pub(crate) fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EventIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NamespaceId {
    fn from(value: u32) -> Self {
        NamespaceId(value)
    }
}

impl From<NamespaceId> for u32 {
    fn from(value: NamespaceId) -> Self {
        value.0
    }
}

/// Inclusive interval of logical block addresses.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct LbaRange {
    start: u64,
    end: u64,
}

impl LbaRange {
    /// Builds a range covering `start..=end`, or `None` when `start > end`.
    pub fn new(start: u64, end: u64) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Range covering a single block.
    pub fn single(lba: u64) -> Self {
        Self {
            start: lba,
            end: lba,
        }
    }

    /// First block in the range.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last block in the range (inclusive).
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of blocks covered. Widened so `[0, u64::MAX]` does not wrap.
    pub fn len(&self) -> u128 {
        u128::from(self.end - self.start) + 1
    }

    /// Always false; an `LbaRange` covers at least one block.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns true when the two ranges share at least one block.
    pub fn overlaps(&self, other: &LbaRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }
}

impl fmt::Display for LbaRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} -- {}]", self.start, self.end)
    }
}

/// Access mode requested for a range.
///
/// The engine treats this as metadata only; read requests still conflict with
/// each other.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    /// Shared access.
    #[default]
    Read,
    /// Exclusive access.
    Write,
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKind::Read => f.write_str("R"),
            LockKind::Write => f.write_str("W"),
        }
    }
}
