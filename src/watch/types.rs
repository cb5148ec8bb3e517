//! Watch types for snapshot delivery.

use crate::types::Snapshot;
use serde::{Deserialize, Serialize};

/// Configuration for a snapshot watcher.
#[derive(Clone, Debug)]
pub struct WatchConfig {
    /// Max buffered events before dropping the watcher.
    /// Default: 1000
    pub buffer_size: usize,

    /// Deliver the current snapshot immediately on watch.
    /// Default: true
    pub send_initial: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            send_initial: true,
        }
    }
}

impl WatchConfig {
    /// Config with a custom buffer size.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            ..Default::default()
        }
    }
}

/// Events delivered to watchers.
#[derive(Clone, Debug)]
pub enum StoreEvent<T: Clone> {
    /// The collection after a mutation (or the current one on watch).
    Snapshot(Snapshot<T>),

    /// Watcher was dropped.
    Dropped { reason: DropReason },
}

/// Why a watcher was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unwatched.
    Unsubscribed,
}

/// Unique identifier for a watcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Receiving end of a watcher.
pub struct WatchHandle<T: Clone> {
    pub id: WatchId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<StoreEvent<T>>,
}

impl<T: Clone> WatchHandle<T> {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StoreEvent<T>, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StoreEvent<T>, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<StoreEvent<T>, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain buffered events and return the newest snapshot, if any.
    pub fn latest(&self) -> Option<Snapshot<T>> {
        let mut latest = None;
        while let Ok(event) = self.receiver.try_recv() {
            if let StoreEvent::Snapshot(snapshot) = event {
                latest = Some(snapshot);
            }
        }
        latest
    }
}
