//! QuerySync: binds a query to a normalized store.

use crate::error::{Result, StoreError};
use crate::normalized::{NormalizedStore, StoreConfig};
use crate::types::{Entity, Snapshot};
use crate::watch::WatchHandle;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::activation::{ActivationGuard, ActivationToken};
use super::feed::{FeedEvent, FeedProvider, Unsubscriber};
use super::methods::{MethodsCell, StoreMethods, SyncState};
use super::options::{EntityHandler, OpenHandler, SyncOptions};
use super::query::{QueryDescriptor, QueryFingerprint};

/// What an activation is keyed on. Equal keys suppress resubscription.
#[derive(Clone, Debug, PartialEq, Eq)]
struct ActivationKey {
    fingerprint: QueryFingerprint,
    live: bool,
}

/// Keeps one [`NormalizedStore`] synchronized with at most one active query.
///
/// Call [`sync`](Self::sync) whenever the options may have changed. A new
/// query fingerprint (or live flag) releases the previous subscription,
/// then fetches or subscribes in a background task on the current Tokio
/// runtime. Dropping the `QuerySync` releases everything.
pub struct QuerySync<Q: QueryDescriptor, T: Entity> {
    provider: Arc<dyn FeedProvider<Q, T>>,
    store: NormalizedStore<T>,
    methods: MethodsCell<T>,
    state: Arc<watch::Sender<SyncState>>,
    guard: Arc<ActivationGuard>,
    /// Unsubscriber of the live subscription, once opened.
    live: Arc<Mutex<Option<Unsubscriber>>>,
    active: Option<ActivationKey>,
    task: Option<JoinHandle<Result<()>>>,
}

impl<Q: QueryDescriptor, T: Entity> QuerySync<Q, T> {
    /// Create an idle sync over an empty store.
    pub fn new(provider: Arc<dyn FeedProvider<Q, T>>) -> Self {
        Self::with_store(provider, NormalizedStore::new())
    }

    /// Create an idle sync over an empty store with custom config.
    pub fn with_config(provider: Arc<dyn FeedProvider<Q, T>>, config: StoreConfig) -> Self {
        Self::with_store(provider, NormalizedStore::with_config(config))
    }

    /// Create an idle sync over an existing store.
    pub fn with_store(provider: Arc<dyn FeedProvider<Q, T>>, store: NormalizedStore<T>) -> Self {
        let (sender, _) = watch::channel(SyncState::Idle);
        let state = Arc::new(sender);
        let methods = MethodsCell::new(StoreMethods::new(store.clone(), Arc::clone(&state)));

        Self {
            provider,
            store,
            methods,
            state,
            guard: Arc::new(ActivationGuard::new()),
            live: Arc::new(Mutex::new(None)),
            active: None,
            task: None,
        }
    }

    /// Apply `options`.
    ///
    /// Does nothing when the query fingerprint and live flag match the
    /// current activation. Must run inside a Tokio runtime when a query is
    /// given.
    pub fn sync(&mut self, options: SyncOptions<Q, T>) -> Result<()> {
        self.methods.bind(self.bound_methods());

        let key = match &options.query {
            Some(query) => Some(ActivationKey {
                fingerprint: QueryFingerprint::of(query)?,
                live: options.enable_live_query,
            }),
            None => None,
        };

        if key == self.active {
            trace!("query unchanged, keeping activation");
            return Ok(());
        }

        let key = match key {
            Some(key) => key,
            None => {
                debug!("query cleared");
                self.teardown();
                return Ok(());
            }
        };

        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;

        self.release();
        let token = self.guard.current();
        self.state.send_replace(SyncState::Loading);

        debug!(fingerprint = %key.fingerprint, live = key.live, token = token.0, "activating query");

        let activation = Activation {
            token,
            fingerprint: key.fingerprint.clone(),
            live: key.live,
            provider: Arc::clone(&self.provider),
            methods: self.methods.clone(),
            state: Arc::clone(&self.state),
            guard: Arc::clone(&self.guard),
            live_slot: Arc::clone(&self.live),
            on_open: options.on_open,
            on_update: options.on_update,
            on_delete: options.on_delete,
        };

        self.task = Some(runtime.spawn(activation.run()));
        self.active = Some(key);
        Ok(())
    }

    /// Release the subscription and return to `Idle`. The collection is kept.
    pub fn teardown(&mut self) {
        self.release();
        self.active = None;
        self.state.send_replace(SyncState::Idle);
    }

    /// Wait for the current activation task to finish and return its
    /// outcome. Feed errors surface here.
    ///
    /// A live activation finishes when its feed closes.
    ///
    /// The task stays owned by this `QuerySync` until it finishes, so a
    /// cancelled `closed()` never leaves it running detached.
    pub async fn closed(&mut self) -> Result<()> {
        let outcome = match self.task.as_mut() {
            Some(task) => task.await,
            None => return Ok(()),
        };
        self.task = None;
        outcome?
    }

    /// Invalidate the running activation, unsubscribe, and stop its task.
    fn release(&mut self) {
        self.guard.advance();

        if let Some(unsubscriber) = self.live.lock().take() {
            debug!(fingerprint = ?self.active.as_ref().map(|key| &key.fingerprint), "unsubscribing");
            unsubscriber.unsubscribe();
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn bound_methods(&self) -> StoreMethods<T> {
        StoreMethods::new(self.store.clone(), Arc::clone(&self.state))
    }

    // --- Consumer surface ---

    pub fn store(&self) -> &NormalizedStore<T> {
        &self.store
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.store.snapshot()
    }

    /// Entities sorted by id.
    pub fn values(&self) -> Arc<[T]> {
        self.store.values()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.store.get(id)
    }

    /// Watch snapshots of the synced collection.
    pub fn watch(&self) -> WatchHandle<T> {
        self.store.watch()
    }

    /// Optimistic local edit.
    pub fn update(&self, patch: T::Patch) -> Result<()> {
        self.methods.current().update(patch)
    }

    /// Currently bound mutation methods.
    pub fn methods(&self) -> StoreMethods<T> {
        self.methods.current()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change.
    pub fn state_changes(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Fingerprint of the active query.
    pub fn fingerprint(&self) -> Option<&QueryFingerprint> {
        self.active.as_ref().map(|key| &key.fingerprint)
    }
}

impl<Q: QueryDescriptor, T: Entity> Drop for QuerySync<Q, T> {
    fn drop(&mut self) {
        self.release();
    }
}

/// One activation: everything the background task needs.
struct Activation<Q: QueryDescriptor, T: Entity> {
    token: ActivationToken,
    fingerprint: QueryFingerprint,
    live: bool,
    provider: Arc<dyn FeedProvider<Q, T>>,
    methods: MethodsCell<T>,
    state: Arc<watch::Sender<SyncState>>,
    guard: Arc<ActivationGuard>,
    live_slot: Arc<Mutex<Option<Unsubscriber>>>,
    on_open: Option<OpenHandler<T>>,
    on_update: Option<EntityHandler<T>>,
    on_delete: Option<EntityHandler<T>>,
}

impl<Q: QueryDescriptor, T: Entity> Activation<Q, T> {
    async fn run(self) -> Result<()> {
        let result = self.drive().await;
        if let Err(ref e) = result {
            warn!(fingerprint = %self.fingerprint, error = %e, "query activation failed");
        }
        result
    }

    async fn drive(&self) -> Result<()> {
        let query: Q = self.fingerprint.decode()?;

        if !self.live {
            return self.first_fetch(&query).await;
        }

        let includes = query.includes();
        let subscription = self.provider.subscribe(&query).await?;
        let (mut events, unsubscriber) = subscription.into_parts();

        let slot = Arc::clone(&self.live_slot);
        let stored = self.guard.run_if_current(self.token, move || {
            *slot.lock() = Some(unsubscriber);
        });
        if stored.is_none() {
            // Superseded while subscribing; the dropped unsubscriber released it.
            debug!(fingerprint = %self.fingerprint, "subscription opened after being superseded");
            return Ok(());
        }

        // A failed event does not stop the feed; the first failure is
        // reported once the feed closes.
        let mut first_error = None;
        while let Some(event) = events.recv().await {
            if !self.guard.is_current(self.token) {
                break;
            }
            let kind = event.kind();
            trace!(fingerprint = %self.fingerprint, kind = %kind, "feed event");

            if let Err(e) = self.dispatch(event, &query, &includes).await {
                warn!(fingerprint = %self.fingerprint, kind = %kind, error = %e, "feed event failed");
                first_error.get_or_insert(e);
            }
        }

        debug!(fingerprint = %self.fingerprint, "feed closed");
        first_error.map_or(Ok(()), Err)
    }

    async fn dispatch(&self, event: FeedEvent<T>, query: &Q, includes: &[String]) -> Result<()> {
        match event {
            FeedEvent::Open => self.first_fetch(query).await,
            FeedEvent::Create(entity) | FeedEvent::Update(entity) | FeedEvent::Enter(entity) => {
                self.handle_update(entity, includes).await
            }
            FeedEvent::Leave(entity) | FeedEvent::Delete(entity) => self.handle_delete(entity).await,
        }
    }

    /// Methods for overrides, dropped once this activation is superseded.
    fn handler_methods(&self) -> StoreMethods<T> {
        self.methods.current().scoped(Arc::clone(&self.guard), self.token)
    }

    async fn first_fetch(&self, query: &Q) -> Result<()> {
        if let Some(on_open) = &self.on_open {
            if !self.guard.is_current(self.token) {
                return Ok(());
            }
            return on_open(self.handler_methods()).await;
        }

        let entities = self.provider.fetch_all(query).await?;
        let count = entities.len();

        let applied = self
            .guard
            .run_if_current(self.token, || -> Result<()> {
                self.methods.current().initialize(entities)?;
                self.state.send_replace(SyncState::Synced);
                Ok(())
            })
            .transpose()?;

        match applied {
            Some(()) => debug!(fingerprint = %self.fingerprint, count, "initial fetch applied"),
            None => debug!(fingerprint = %self.fingerprint, "discarding superseded fetch"),
        }
        Ok(())
    }

    async fn handle_update(&self, entity: T, includes: &[String]) -> Result<()> {
        if let Some(on_update) = &self.on_update {
            if !self.guard.is_current(self.token) {
                return Ok(());
            }
            return on_update(entity, self.handler_methods()).await;
        }

        // Hydrate first so a partial entity never replaces a hydrated one.
        let entity = self.provider.resolve_includes(entity, includes).await?;
        self.guard
            .run_if_current(self.token, || self.methods.current().set(entity))
            .transpose()?;
        Ok(())
    }

    async fn handle_delete(&self, entity: T) -> Result<()> {
        if let Some(on_delete) = &self.on_delete {
            if !self.guard.is_current(self.token) {
                return Ok(());
            }
            return on_delete(entity, self.handler_methods()).await;
        }

        self.guard
            .run_if_current(self.token, || self.methods.current().remove(entity.id()))
            .transpose()?;
        Ok(())
    }
}
