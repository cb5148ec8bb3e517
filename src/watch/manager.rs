//! Watch manager for broadcasting snapshots.

use crate::types::Snapshot;
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

use super::types::{DropReason, StoreEvent, WatchConfig, WatchHandle, WatchId};

/// Internal watcher state.
struct Watcher<T: Clone> {
    sender: Sender<StoreEvent<T>>,
}

impl<T: Clone> Watcher<T> {
    /// Try to send an event. Returns false if the buffer is full or the
    /// receiver is gone (watcher will be dropped).
    fn try_send(&self, event: StoreEvent<T>) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(crossbeam_channel::TrySendError::Full(_)) => false,
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Manages snapshot watchers for one store.
pub struct WatchManager<T: Clone> {
    /// Active watchers by ID.
    watchers: RwLock<HashMap<WatchId, Watcher<T>>>,
    /// Counter for generating watcher IDs.
    next_id: AtomicU64,
}

impl<T: Clone> WatchManager<T> {
    /// Create a new watch manager.
    pub fn new() -> Self {
        Self {
            watchers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a watcher.
    ///
    /// With `send_initial`, `current` is queued before any later snapshot.
    pub fn watch(&self, config: WatchConfig, current: Snapshot<T>) -> WatchHandle<T> {
        let id = WatchId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        let watcher = Watcher { sender };
        if config.send_initial {
            watcher.try_send(StoreEvent::Snapshot(current));
        }

        self.watchers.write().insert(id, watcher);

        WatchHandle { id, receiver }
    }

    /// Unregister a watcher.
    pub fn unwatch(&self, id: WatchId) {
        let mut watchers = self.watchers.write();
        if let Some(watcher) = watchers.remove(&id) {
            // Best effort
            let _ = watcher.sender.try_send(StoreEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Get watcher count.
    pub fn watcher_count(&self) -> usize {
        self.watchers.read().len()
    }

    /// Broadcast a snapshot to every watcher. Drops watchers that fail to
    /// receive.
    pub fn broadcast(&self, snapshot: &Snapshot<T>) {
        let mut to_remove = Vec::new();

        {
            let watchers = self.watchers.read();
            for (id, watcher) in watchers.iter() {
                if !watcher.try_send(StoreEvent::Snapshot(snapshot.clone())) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut watchers = self.watchers.write();
            for id in to_remove {
                if let Some(watcher) = watchers.remove(&id) {
                    warn!(watcher = id.0, version = snapshot.version().0, "dropping slow snapshot watcher");
                    let _ = watcher.sender.try_send(StoreEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl<T: Clone> Default for WatchManager<T> {
    fn default() -> Self {
        Self::new()
    }
}
