//! Feed provider contract: fetch-all, live subscriptions, include resolution.

use crate::error::Result;
use crate::types::Entity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use super::query::QueryDescriptor;

/// Kinds of events a live subscription emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Open,
    Create,
    Update,
    Enter,
    Leave,
    Delete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Open => "open",
            EventKind::Create => "create",
            EventKind::Update => "update",
            EventKind::Enter => "enter",
            EventKind::Leave => "leave",
            EventKind::Delete => "delete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event delivered by a live subscription.
#[derive(Clone, Debug, PartialEq)]
pub enum FeedEvent<T> {
    /// Subscription is established on the backend.
    Open,
    /// Entity was created and matches the query.
    Create(T),
    /// Matching entity changed and still matches.
    Update(T),
    /// Entity changed and now matches.
    Enter(T),
    /// Entity changed and no longer matches.
    Leave(T),
    /// Matching entity was deleted.
    Delete(T),
}

impl<T> FeedEvent<T> {
    pub fn kind(&self) -> EventKind {
        match self {
            FeedEvent::Open => EventKind::Open,
            FeedEvent::Create(_) => EventKind::Create,
            FeedEvent::Update(_) => EventKind::Update,
            FeedEvent::Enter(_) => EventKind::Enter,
            FeedEvent::Leave(_) => EventKind::Leave,
            FeedEvent::Delete(_) => EventKind::Delete,
        }
    }

    pub fn entity(&self) -> Option<&T> {
        match self {
            FeedEvent::Open => None,
            FeedEvent::Create(entity)
            | FeedEvent::Update(entity)
            | FeedEvent::Enter(entity)
            | FeedEvent::Leave(entity)
            | FeedEvent::Delete(entity) => Some(entity),
        }
    }
}

/// Releases a subscription on the backend. Fires at most once: on
/// [`unsubscribe`](Self::unsubscribe) or on drop, whichever comes first.
pub struct Unsubscriber {
    hook: Option<Box<dyn FnOnce() + Send>>,
}

impl Unsubscriber {
    pub fn new(hook: impl FnOnce() + Send + 'static) -> Self {
        Self {
            hook: Some(Box::new(hook)),
        }
    }

    /// An unsubscriber with nothing to release.
    pub fn noop() -> Self {
        Self { hook: None }
    }

    pub fn unsubscribe(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(hook) = self.hook.take() {
            hook();
        }
    }
}

impl Drop for Unsubscriber {
    fn drop(&mut self) {
        self.fire();
    }
}

impl fmt::Debug for Unsubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscriber")
            .field("armed", &self.hook.is_some())
            .finish()
    }
}

/// An open live query.
///
/// Events arrive in feed order. Dropping the subscription unsubscribes.
pub struct Subscription<T> {
    events: mpsc::UnboundedReceiver<FeedEvent<T>>,
    unsubscriber: Unsubscriber,
}

impl<T> Subscription<T> {
    pub fn new(events: mpsc::UnboundedReceiver<FeedEvent<T>>, unsubscriber: Unsubscriber) -> Self {
        Self { events, unsubscriber }
    }

    /// Create a subscription fed through the returned sender.
    pub fn channel(on_unsubscribe: impl FnOnce() + Send + 'static) -> (mpsc::UnboundedSender<FeedEvent<T>>, Self) {
        let (sender, events) = mpsc::unbounded_channel();
        (sender, Self::new(events, Unsubscriber::new(on_unsubscribe)))
    }

    /// Next event, or `None` once the feed has closed.
    pub async fn next_event(&mut self) -> Option<FeedEvent<T>> {
        self.events.recv().await
    }

    pub fn unsubscribe(self) {
        self.unsubscriber.unsubscribe();
    }

    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<FeedEvent<T>>, Unsubscriber) {
        (self.events, self.unsubscriber)
    }
}

/// Backend access consumed by [`QuerySync`](super::QuerySync).
///
/// Errors are returned as-is; retry and reconnection belong to the provider.
#[async_trait]
pub trait FeedProvider<Q, T>: Send + Sync + 'static
where
    Q: QueryDescriptor,
    T: Entity,
{
    /// Every entity matching `query`.
    async fn fetch_all(&self, query: &Q) -> Result<Vec<T>>;

    /// Open a live subscription for `query`.
    async fn subscribe(&self, query: &Q) -> Result<Subscription<T>>;

    /// Hydrate the relations named in `includes` on a feed entity.
    async fn resolve_includes(&self, entity: T, includes: &[String]) -> Result<T> {
        let _ = includes;
        Ok(entity)
    }
}
