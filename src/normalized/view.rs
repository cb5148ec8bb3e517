//! Memoized list projection of a snapshot.

use crate::types::{Entity, Snapshot, Version};
use parking_lot::Mutex;
use std::sync::Arc;

/// Caches the ordered list derived from the most recent snapshot.
///
/// The cache is keyed on the snapshot version, so reading the list twice
/// without a mutation in between returns the same allocation.
pub struct ListView<T> {
    cached: Mutex<Option<(Version, Arc<[T]>)>>,
}

impl<T: Entity> ListView<T> {
    pub fn new() -> Self {
        Self {
            cached: Mutex::new(None),
        }
    }

    /// Entities of `snapshot`, sorted by id.
    pub fn project(&self, snapshot: &Snapshot<T>) -> Arc<[T]> {
        let mut cached = self.cached.lock();
        if let Some((version, list)) = cached.as_ref() {
            if *version == snapshot.version() {
                return Arc::clone(list);
            }
        }

        let mut values: Vec<T> = snapshot.iter().map(|(_, entity)| entity.clone()).collect();
        values.sort_by(|a, b| a.id().cmp(b.id()));
        let list: Arc<[T]> = values.into();

        *cached = Some((snapshot.version(), Arc::clone(&list)));
        list
    }
}

impl<T: Entity> Default for ListView<T> {
    fn default() -> Self {
        Self::new()
    }
}
