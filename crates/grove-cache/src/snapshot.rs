use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;

use crate::error::CacheError;
use crate::fingerprint::Fingerprint;

struct Entry<T> {
    snapshot: Arc<T>,
    ref_count: usize,
}

struct StoreInner<T> {
    entries: Mutex<HashMap<Fingerprint, Entry<T>>>,
}

impl<T> StoreInner<T> {
    #[track_caller]
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<Fingerprint, Entry<T>>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(err) => {
                let loc = std::panic::Location::caller();
                tracing::error!(
                    target: "grove.cache",
                    file = loc.file(),
                    line = loc.line(),
                    column = loc.column(),
                    error = %err,
                    "mutex poisoned; continuing with recovered guard"
                );
                err.into_inner()
            }
        }
    }

    fn release(&self, key: &Fingerprint) {
        let mut entries = self.lock_entries();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        entry.ref_count = entry.ref_count.saturating_sub(1);
        if entry.ref_count == 0 {
            entries.remove(key);
            tracing::debug!(target: "grove.cache", key = key.prefix(12), "evicted snapshot");
        }
    }
}

/// Refcounted cache of expensive, immutable snapshots keyed by their inputs.
///
/// Owners share one snapshot per distinct input set. Each [`SnapshotHandle`] holds one
/// reference; the entry is removed when the last handle is released or dropped. Cloning the
/// store shares the same entries.
pub struct SnapshotStore<T> {
    inner: Arc<StoreInner<T>>,
}

impl<T> Clone for SnapshotStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for SnapshotStore<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }
}

impl<T> fmt::Debug for SnapshotStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("entries", &self.len())
            .finish()
    }
}

impl<T> SnapshotStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic key for an input set: each input is serialized to JSON, then the
    /// serializations are sorted, deduplicated and hashed.
    pub fn key_for<I: Serialize>(inputs: &[I]) -> Result<Fingerprint, CacheError> {
        let parts = inputs
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Fingerprint::from_unordered(parts))
    }

    /// Returns a handle to the snapshot for `inputs`, building it with `build` on a miss.
    ///
    /// `build` runs without holding the store lock. If two callers miss on the same key
    /// concurrently, the first insert wins and the other build is discarded.
    pub fn acquire<I: Serialize>(
        &self,
        inputs: &[I],
        build: impl FnOnce() -> T,
    ) -> Result<SnapshotHandle<T>, CacheError> {
        let key = Self::key_for(inputs)?;

        if let Some(handle) = self.retain_existing(&key) {
            tracing::trace!(target: "grove.cache", key = key.prefix(12), "snapshot hit");
            return Ok(handle);
        }

        let built = Arc::new(build());

        let mut entries = self.inner.lock_entries();
        let entry = entries.entry(key.clone()).or_insert_with(|| {
            tracing::debug!(
                target: "grove.cache",
                key = key.prefix(12),
                inputs = inputs.len(),
                "built snapshot"
            );
            Entry {
                snapshot: Arc::clone(&built),
                ref_count: 0,
            }
        });
        if !Arc::ptr_eq(&entry.snapshot, &built) {
            tracing::debug!(
                target: "grove.cache",
                key = key.prefix(12),
                "discarding duplicate snapshot build"
            );
        }
        entry.ref_count += 1;
        let snapshot = Arc::clone(&entry.snapshot);
        drop(entries);

        Ok(SnapshotHandle {
            key,
            snapshot,
            store: Arc::downgrade(&self.inner),
        })
    }

    /// Releases `handle`. Equivalent to dropping it.
    pub fn release(&self, handle: SnapshotHandle<T>) {
        drop(handle);
    }

    pub fn ref_count(&self, key: &Fingerprint) -> usize {
        self.inner
            .lock_entries()
            .get(key)
            .map_or(0, |entry| entry.ref_count)
    }

    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.inner.lock_entries().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn retain_existing(&self, key: &Fingerprint) -> Option<SnapshotHandle<T>> {
        let mut entries = self.inner.lock_entries();
        let entry = entries.get_mut(key)?;
        entry.ref_count += 1;
        Some(SnapshotHandle {
            key: key.clone(),
            snapshot: Arc::clone(&entry.snapshot),
            store: Arc::downgrade(&self.inner),
        })
    }
}

/// A counted reference to a snapshot in a [`SnapshotStore`].
///
/// Cloning takes another reference; dropping releases one. Handles outliving their store keep
/// the snapshot alive but no longer touch any bookkeeping.
pub struct SnapshotHandle<T> {
    key: Fingerprint,
    snapshot: Arc<T>,
    store: Weak<StoreInner<T>>,
}

impl<T> SnapshotHandle<T> {
    pub fn key(&self) -> &Fingerprint {
        &self.key
    }

    pub fn snapshot(&self) -> &Arc<T> {
        &self.snapshot
    }
}

impl<T> Deref for SnapshotHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.snapshot
    }
}

impl<T> Clone for SnapshotHandle<T> {
    fn clone(&self) -> Self {
        if let Some(store) = self.store.upgrade() {
            if let Some(entry) = store.lock_entries().get_mut(&self.key) {
                entry.ref_count += 1;
            }
        }
        Self {
            key: self.key.clone(),
            snapshot: Arc::clone(&self.snapshot),
            store: Weak::clone(&self.store),
        }
    }
}

impl<T> Drop for SnapshotHandle<T> {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.release(&self.key);
        }
    }
}

impl<T> fmt::Debug for SnapshotHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotHandle")
            .field("key", &self.key.prefix(12))
            .finish_non_exhaustive()
    }
}
