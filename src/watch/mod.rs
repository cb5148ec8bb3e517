//! Snapshot watchers for live store updates.
//!
//! Every mutation applied to a [`NormalizedStore`](crate::NormalizedStore)
//! publishes the resulting snapshot to its watchers:
//! - Bounded buffers with slow-watcher dropping
//! - Optional delivery of the current snapshot on watch
//!
//! # Example
//!
//! ```ignore
//! let store = NormalizedStore::<Document>::new();
//! let handle = store.watch();
//!
//! store.set(Document::new("a").with("v", 1))?;
//!
//! loop {
//!     match handle.recv() {
//!         Ok(StoreEvent::Snapshot(snapshot)) => println!("{} entities", snapshot.len()),
//!         Ok(StoreEvent::Dropped { .. }) | Err(_) => break,
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::WatchManager;
pub use types::{DropReason, StoreEvent, WatchConfig, WatchHandle, WatchId};
