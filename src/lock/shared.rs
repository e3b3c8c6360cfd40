use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::manager::{LockHandle, LockManager, LockOutcome, ReleaseSummary};
use super::options::LockManagerOptions;
use crate::error::Result;
use crate::types::{LockKind, NamespaceId};

/// Cloneable handle that serializes every call through one mutex.
///
/// The mutex is held only for the duration of a single request or release;
/// nothing here waits for a range to become free.
#[derive(Clone, Debug)]
pub struct SharedLockManager {
    inner: Arc<Mutex<LockManager>>,
}

impl SharedLockManager {
    /// Builds a shared manager from options.
    pub fn new(options: LockManagerOptions) -> Result<Self> {
        Ok(Self::from(LockManager::new(options)?))
    }

    /// See [`LockManager::lock_request`].
    pub fn lock_request(
        &self,
        start: u64,
        end: u64,
        kind: LockKind,
        allow_queue: bool,
        namespace: NamespaceId,
    ) -> Result<LockOutcome> {
        self.inner
            .lock()
            .lock_request(start, end, kind, allow_queue, namespace)
    }

    /// See [`LockManager::lock_release`].
    pub fn lock_release(&self, handle: LockHandle, namespace: NamespaceId) -> Result<ReleaseSummary> {
        self.inner.lock().lock_release(handle, namespace)
    }

    /// Locks the manager for a sequence of calls.
    pub fn lock(&self) -> MutexGuard<'_, LockManager> {
        self.inner.lock()
    }
}

impl From<LockManager> for SharedLockManager {
    fn from(manager: LockManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }
}
