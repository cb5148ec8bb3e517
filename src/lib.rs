//! # Normalized Sync
//!
//! A normalized (by-id) entity cache kept in sync with a backend query,
//! either by a one-shot fetch or through a live subscription feed.
//!
//! ## Core Concepts
//!
//! - **NormalizedStore**: Keyed entity cache; every mutation derives from the
//!   latest collection and publishes a fresh snapshot
//! - **QuerySync**: Binds a query to a store, resubscribing only when the
//!   query fingerprint changes
//! - **FeedProvider**: Backend capability (fetch-all, subscribe, resolve
//!   includes) supplied by the caller
//!
//! ## Example
//!
//! ```ignore
//! use normalized_sync::{Document, NormalizedStore};
//!
//! let store = NormalizedStore::new();
//! store.initialize(vec![Document::new("a").with("v", 1)])?;
//!
//! // Partial update: other fields of "a" are kept
//! store.update(Document::new("a").with("v", 2))?;
//!
//! // Update before the entity exists is allowed
//! store.update(Document::new("z").with("v", 9))?;
//! ```

pub mod error;
pub mod normalized;
pub mod sync;
pub mod types;
pub mod watch;

// Re-exports
pub use error::{Result, StoreError};
pub use normalized::{apply_mutation, ListView, NormalizedStore, StoreConfig};
pub use sync::{
    ActivationGuard, ActivationToken, EntityHandler, EventKind, FeedEvent, FeedProvider,
    MethodsCell, OpenHandler, Query, QueryDescriptor, QueryFingerprint, QuerySync, StoreMethods,
    Subscription, SyncOptions, SyncState, Unsubscriber,
};
pub use types::*;
pub use watch::{DropReason, StoreEvent, WatchConfig, WatchHandle, WatchId, WatchManager};
