//! Shared snapshot cache read by callers and written by the worker.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hanamirip_transfer_core::{EngineHandle, EngineSnapshot};

#[derive(Clone, Default)]
pub(crate) struct SnapshotCache {
    inner: Arc<RwLock<HashMap<EngineHandle, EngineSnapshot>>>,
}

impl SnapshotCache {
    pub(crate) fn get(&self, handle: EngineHandle) -> Option<EngineSnapshot> {
        self.read().get(&handle).cloned()
    }

    pub(crate) fn contains(&self, handle: EngineHandle) -> bool {
        self.read().contains_key(&handle)
    }

    pub(crate) fn insert(&self, handle: EngineHandle, snapshot: EngineSnapshot) {
        self.write().insert(handle, snapshot);
    }

    /// Replace an existing entry; a handle removed meanwhile stays removed.
    pub(crate) fn update(&self, handle: EngineHandle, snapshot: EngineSnapshot) {
        if let Some(slot) = self.write().get_mut(&handle) {
            *slot = snapshot;
        }
    }

    pub(crate) fn remove(&self, handle: EngineHandle) {
        self.write().remove(&handle);
    }

    pub(crate) fn handles(&self) -> Vec<EngineHandle> {
        let mut handles: Vec<_> = self.read().keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<EngineHandle, EngineSnapshot>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<EngineHandle, EngineSnapshot>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_does_not_resurrect_removed_handles() {
        let cache = SnapshotCache::default();
        let handle = EngineHandle::new(3);
        cache.insert(handle, EngineSnapshot::initializing());
        assert!(cache.contains(handle));

        cache.remove(handle);
        cache.update(handle, EngineSnapshot::default());
        assert!(cache.get(handle).is_none());
        assert!(cache.handles().is_empty());
    }
}
