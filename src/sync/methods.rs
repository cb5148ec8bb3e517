//! Mutation methods handed to feed handlers, and the cell that keeps them
//! current.

use crate::error::Result;
use crate::normalized::NormalizedStore;
use crate::types::{Entity, Snapshot};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use super::activation::{ActivationGuard, ActivationToken};

/// Lifecycle of a [`QuerySync`](super::QuerySync).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No query.
    Idle,
    /// Fetch or subscribe-and-wait-for-open in flight.
    Loading,
    /// Data populated.
    Synced,
}

impl SyncState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SyncState::Loading)
    }
}

/// Activation a set of methods belongs to.
#[derive(Clone)]
struct Scope {
    guard: Arc<ActivationGuard>,
    token: ActivationToken,
}

/// Store mutation methods plus the loading signal.
///
/// Methods handed to feed handlers are scoped to one activation: once a newer
/// activation starts, their mutations and `mark_loaded` are discarded.
pub struct StoreMethods<T: Entity> {
    store: NormalizedStore<T>,
    state: Arc<watch::Sender<SyncState>>,
    scope: Option<Scope>,
}

impl<T: Entity> Clone for StoreMethods<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            state: Arc::clone(&self.state),
            scope: self.scope.clone(),
        }
    }
}

impl<T: Entity> StoreMethods<T> {
    pub(crate) fn new(store: NormalizedStore<T>, state: Arc<watch::Sender<SyncState>>) -> Self {
        Self {
            store,
            state,
            scope: None,
        }
    }

    /// Same methods, limited to the activation identified by `token`.
    pub(crate) fn scoped(self, guard: Arc<ActivationGuard>, token: ActivationToken) -> Self {
        Self {
            scope: Some(Scope { guard, token }),
            ..self
        }
    }

    /// False once the activation these methods belong to was superseded.
    pub fn is_current(&self) -> bool {
        match &self.scope {
            Some(scope) => scope.guard.is_current(scope.token),
            None => true,
        }
    }

    /// Run `f` unless the scope is stale. Stale calls are dropped, not errors.
    fn guarded(&self, operation: &'static str, f: impl FnOnce() -> Result<()>) -> Result<()> {
        let scope = match &self.scope {
            Some(scope) => scope,
            None => return f(),
        };
        match scope.guard.run_if_current(scope.token, f) {
            Some(result) => result,
            None => {
                debug!(operation, token = scope.token.0, "discarding superseded mutation");
                Ok(())
            }
        }
    }

    pub fn initialize(&self, entities: Vec<T>) -> Result<()> {
        self.guarded("initialize", || self.store.initialize(entities))
    }

    pub fn set_many(&self, entities: Vec<T>) -> Result<()> {
        self.guarded("set_many", || self.store.set_many(entities))
    }

    pub fn set(&self, entity: T) -> Result<()> {
        self.guarded("set", || self.store.set(entity))
    }

    pub fn update(&self, patch: T::Patch) -> Result<()> {
        self.guarded("update", || self.store.update(patch))
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        self.guarded("remove", || self.store.remove(id))
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.store.get(id)
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.store.snapshot()
    }

    /// Leave `Loading`. An `on_open` override calls this once its initial
    /// population is done.
    pub fn mark_loaded(&self) {
        let _ = self.guarded("mark_loaded", || {
            self.state.send_if_modified(|state| {
                if *state == SyncState::Loading {
                    *state = SyncState::Synced;
                    true
                } else {
                    false
                }
            });
            Ok(())
        });
    }
}

/// Single-slot holder for the latest [`StoreMethods`].
///
/// Long-lived feed handlers read the slot at call time instead of capturing
/// methods when the subscription was opened.
pub struct MethodsCell<T: Entity> {
    slot: Arc<RwLock<StoreMethods<T>>>,
}

impl<T: Entity> Clone for MethodsCell<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Entity> MethodsCell<T> {
    pub fn new(methods: StoreMethods<T>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(methods)),
        }
    }

    /// Replace the methods seen by every holder of this cell.
    pub fn bind(&self, methods: StoreMethods<T>) {
        *self.slot.write() = methods;
    }

    pub fn current(&self) -> StoreMethods<T> {
        self.slot.read().clone()
    }
}
