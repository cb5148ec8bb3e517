//! Query synchronization.
//!
//! A [`QuerySync`] owns a [`NormalizedStore`](crate::NormalizedStore) and
//! keeps it in step with one backend query at a time:
//! - Fingerprints queries so structurally equal descriptors never resubscribe
//! - Fetches once, or subscribes to a live feed and applies its events in order
//! - Releases the previous subscription exactly once before opening the next
//! - Discards async results that arrive after a newer activation started
//!
//! # Example
//!
//! ```ignore
//! let mut sync = QuerySync::new(provider);
//!
//! sync.sync(
//!     SyncOptions::for_query(Query::new("Todo").equal_to("done", false))
//!         .live(true),
//! )?;
//!
//! let mut state = sync.state_changes();
//! state.wait_for(|s| *s == SyncState::Synced).await?;
//! println!("{} todos", sync.values().len());
//! ```

mod activation;
mod engine;
mod feed;
mod methods;
mod options;
mod query;

pub use activation::{ActivationGuard, ActivationToken};
pub use engine::QuerySync;
pub use feed::{EventKind, FeedEvent, FeedProvider, Subscription, Unsubscriber};
pub use methods::{MethodsCell, StoreMethods, SyncState};
pub use options::{EntityHandler, OpenHandler, SyncOptions};
pub use query::{Query, QueryDescriptor, QueryFingerprint};
