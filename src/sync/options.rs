//! Options for a query sync.

use crate::error::Result;
use crate::types::Entity;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::methods::StoreMethods;

/// Replaces the default fetch-all on open.
pub type OpenHandler<T> = Arc<dyn Fn(StoreMethods<T>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Replaces the default handling of a feed entity.
pub type EntityHandler<T> =
    Arc<dyn Fn(T, StoreMethods<T>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// What to sync and how.
pub struct SyncOptions<Q, T: Entity> {
    /// Query to sync. `None` leaves the sync idle.
    pub query: Option<Q>,

    /// Subscribe to the live feed instead of fetching once.
    pub enable_live_query: bool,

    /// Custom initial population. Must call
    /// [`StoreMethods::mark_loaded`] when done.
    pub on_open: Option<OpenHandler<T>>,

    /// Custom handling of `create`, `update` and `enter` events.
    pub on_update: Option<EntityHandler<T>>,

    /// Custom handling of `leave` and `delete` events.
    pub on_delete: Option<EntityHandler<T>>,
}

impl<Q, T: Entity> SyncOptions<Q, T> {
    pub fn new() -> Self {
        Self {
            query: None,
            enable_live_query: false,
            on_open: None,
            on_update: None,
            on_delete: None,
        }
    }

    /// Options for `query`, fetched once.
    pub fn for_query(query: Q) -> Self {
        Self::new().query(query)
    }

    pub fn query(mut self, query: Q) -> Self {
        self.query = Some(query);
        self
    }

    pub fn live(mut self, enable: bool) -> Self {
        self.enable_live_query = enable;
        self
    }

    pub fn on_open<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(StoreMethods<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_open = Some(Arc::new(move |methods: StoreMethods<T>| handler(methods).boxed()));
        self
    }

    pub fn on_update<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(T, StoreMethods<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_update = Some(Arc::new(move |entity: T, methods: StoreMethods<T>| {
            handler(entity, methods).boxed()
        }));
        self
    }

    pub fn on_delete<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(T, StoreMethods<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_delete = Some(Arc::new(move |entity: T, methods: StoreMethods<T>| {
            handler(entity, methods).boxed()
        }));
        self
    }
}

impl<Q, T: Entity> Default for SyncOptions<Q, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q: fmt::Debug, T: Entity> fmt::Debug for SyncOptions<Q, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("query", &self.query)
            .field("enable_live_query", &self.enable_live_query)
            .field("on_open", &self.on_open.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_delete", &self.on_delete.is_some())
            .finish()
    }
}
