//! NormalizedStore: keyed entity cache with race-free mutations.

use crate::error::Result;
use crate::types::{Entity, Mutation, Snapshot};
use crate::watch::{WatchConfig, WatchHandle, WatchId, WatchManager};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

use super::operations::apply_mutation;
use super::view::ListView;

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Name used in log output.
    pub label: String,

    /// Config used by [`NormalizedStore::watch`].
    pub watch: WatchConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            label: "normalized".to_string(),
            watch: WatchConfig::default(),
        }
    }
}

struct Inner<T: Entity> {
    config: StoreConfig,
    /// Current snapshot. Mutations read and replace it under this lock.
    current: Mutex<Snapshot<T>>,
    watchers: WatchManager<T>,
    list: ListView<T>,
}

/// A normalized (by-id) entity cache.
///
/// Cloning yields another handle to the same collection. Every mutation is
/// computed from the collection current at apply time, so mutations issued
/// back-to-back from anywhere compose instead of overwriting each other.
pub struct NormalizedStore<T: Entity> {
    inner: Arc<Inner<T>>,
}

impl<T: Entity> Clone for NormalizedStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Entity> NormalizedStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store with custom config.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                current: Mutex::new(Snapshot::empty()),
                watchers: WatchManager::new(),
                list: ListView::new(),
            }),
        }
    }

    // --- Mutations ---

    /// Replace the collection with `entities`. Later duplicates win.
    pub fn initialize(&self, entities: Vec<T>) -> Result<()> {
        self.apply(Mutation::Initialize(entities)).map(|_| ())
    }

    /// Merge `entities` over the collection. Later duplicates win.
    pub fn set_many(&self, entities: Vec<T>) -> Result<()> {
        self.apply(Mutation::SetMany(entities)).map(|_| ())
    }

    /// Insert or overwrite one entity.
    pub fn set(&self, entity: T) -> Result<()> {
        self.apply(Mutation::Set(entity)).map(|_| ())
    }

    /// Shallow-merge `patch` into its entity, creating a partial entry when
    /// the id is not cached yet.
    pub fn update(&self, patch: T::Patch) -> Result<()> {
        self.apply(Mutation::Update(patch)).map(|_| ())
    }

    /// Delete an entity. Absent ids are a no-op.
    pub fn remove(&self, id: &str) -> Result<()> {
        self.apply(Mutation::Remove(id.to_string())).map(|_| ())
    }

    /// Apply a mutation and publish the resulting snapshot.
    pub fn apply(&self, mutation: Mutation<T>) -> Result<Snapshot<T>> {
        let name = mutation.name();
        let mut current = self.inner.current.lock();

        let entities = apply_mutation(current.entities(), mutation)?;
        let next = Snapshot::new(current.version().next(), entities);
        *current = next.clone();

        trace!(
            store = %self.inner.config.label,
            operation = name,
            version = next.version().0,
            len = next.len(),
            "applied mutation"
        );

        // Broadcast under the lock so watchers see versions in order.
        self.inner.watchers.broadcast(&next);
        Ok(next)
    }

    // --- Reads ---

    /// Current snapshot.
    pub fn snapshot(&self) -> Snapshot<T> {
        self.inner.current.lock().clone()
    }

    /// Get one entity by id.
    pub fn get(&self, id: &str) -> Option<T> {
        self.inner.current.lock().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.current.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.inner.current.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.current.lock().is_empty()
    }

    /// Entities sorted by id. Memoized until the next mutation.
    pub fn values(&self) -> Arc<[T]> {
        let snapshot = self.snapshot();
        self.inner.list.project(&snapshot)
    }

    // --- Watchers ---

    /// Watch snapshots using the store's default watch config.
    pub fn watch(&self) -> WatchHandle<T> {
        self.watch_with(self.inner.config.watch.clone())
    }

    /// Watch snapshots with a custom config.
    pub fn watch_with(&self, config: WatchConfig) -> WatchHandle<T> {
        // Hold the lock so no mutation slips between the initial snapshot
        // and registration.
        let current = self.inner.current.lock();
        self.inner.watchers.watch(config, current.clone())
    }

    pub fn unwatch(&self, id: WatchId) {
        self.inner.watchers.unwatch(id);
    }

    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.watcher_count()
    }
}

impl<T: Entity> Default for NormalizedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
