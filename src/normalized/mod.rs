//! Normalized entity cache.
//!
//! Entities are keyed by id in a persistent map. Mutations never edit a
//! published snapshot: each one yields a new collection computed from the
//! latest one, so interleaved callers compose.

mod operations;
mod store;
mod view;

pub use operations::apply_mutation;
pub use store::{NormalizedStore, StoreConfig};
pub use view::ListView;
