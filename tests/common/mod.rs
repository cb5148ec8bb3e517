//! Shared test helpers: a scripted in-memory feed.

#![allow(dead_code)]

use async_trait::async_trait;
use normalized_sync::{
    Document, Entity, FeedEvent, FeedProvider, Query, QueryDescriptor, QuerySync, Result,
    StoreError, Subscription, SyncState,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn provider(feed: &Arc<MemoryFeed>) -> Arc<dyn FeedProvider<Query, Document>> {
    feed.clone()
}

pub fn new_sync(feed: &Arc<MemoryFeed>) -> QuerySync<Query, Document> {
    QuerySync::new(provider(feed))
}

pub fn doc(id: &str, v: i64) -> Document {
    Document::new(id).with("v", v)
}

/// In-memory feed keyed by collection name.
///
/// `subscribe` replays the collection's script, then closes the feed unless
/// `keep_open` was called.
#[derive(Default)]
pub struct MemoryFeed {
    results: Mutex<HashMap<String, Vec<Document>>>,
    scripts: Mutex<HashMap<String, Vec<FeedEvent<Document>>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    hydrated: Mutex<HashMap<String, Document>>,
    senders: Mutex<Vec<mpsc::UnboundedSender<FeedEvent<Document>>>>,
    keep_open: AtomicBool,
    fail_fetch: Mutex<Option<String>>,
    fail_subscribe: Mutex<Option<String>>,
    resolve_delay: Mutex<Option<Duration>>,
    fetches: AtomicUsize,
    subscribes: AtomicUsize,
    unsubscribes: Arc<AtomicUsize>,
}

impl MemoryFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// What `fetch_all` returns for `collection`.
    pub fn set_results(&self, collection: &str, docs: Vec<Document>) {
        self.results.lock().insert(collection.to_string(), docs);
    }

    /// Events replayed on every subscribe to `collection`.
    pub fn script(&self, collection: &str, events: Vec<FeedEvent<Document>>) {
        self.scripts.lock().insert(collection.to_string(), events);
    }

    pub fn keep_open(&self) {
        self.keep_open.store(true, Ordering::SeqCst);
    }

    /// Block `fetch_all` for `collection` until the returned notify fires.
    pub fn gate(&self, collection: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates.lock().insert(collection.to_string(), Arc::clone(&notify));
        notify
    }

    /// Fields added by `resolve_includes` for `id`.
    pub fn hydrate(&self, hydrated: Document) {
        self.hydrated.lock().insert(hydrated.id.clone(), hydrated);
    }

    pub fn fail_fetch(&self, message: &str) {
        *self.fail_fetch.lock() = Some(message.to_string());
    }

    pub fn fail_subscribe(&self, message: &str) {
        *self.fail_subscribe.lock() = Some(message.to_string());
    }

    pub fn delay_resolve(&self, delay: Duration) {
        *self.resolve_delay.lock() = Some(delay);
    }

    /// Push an event to the most recent open subscription.
    pub fn push(&self, event: FeedEvent<Document>) {
        if let Some(sender) = self.senders.lock().last() {
            let _ = sender.send(event);
        }
    }

    /// Close every open feed.
    pub fn close_all(&self) {
        self.senders.lock().clear();
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedProvider<Query, Document> for MemoryFeed {
    async fn fetch_all(&self, query: &Query) -> Result<Vec<Document>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.lock().get(query.collection()).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(message) = self.fail_fetch.lock().clone() {
            return Err(StoreError::feed(message));
        }

        Ok(self
            .results
            .lock()
            .get(query.collection())
            .cloned()
            .unwrap_or_default())
    }

    async fn subscribe(&self, query: &Query) -> Result<Subscription<Document>> {
        if let Some(message) = self.fail_subscribe.lock().clone() {
            return Err(StoreError::feed(message));
        }
        self.subscribes.fetch_add(1, Ordering::SeqCst);

        let unsubscribes = Arc::clone(&self.unsubscribes);
        let (sender, subscription) = Subscription::channel(move || {
            unsubscribes.fetch_add(1, Ordering::SeqCst);
        });

        let script = self
            .scripts
            .lock()
            .get(query.collection())
            .cloned()
            .unwrap_or_default();
        for event in script {
            let _ = sender.send(event);
        }

        if self.keep_open.load(Ordering::SeqCst) {
            self.senders.lock().push(sender);
        }
        Ok(subscription)
    }

    async fn resolve_includes(&self, entity: Document, includes: &[String]) -> Result<Document> {
        let delay = *self.resolve_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if includes.is_empty() {
            return Ok(entity);
        }
        let hydrated = self.hydrated.lock().get(entity.id()).cloned();
        Ok(match hydrated {
            Some(hydrated) => Document::merge(Some(&entity), hydrated),
            None => entity,
        })
    }
}

/// Wait until the sync reaches `target`.
pub async fn wait_for_state(sync: &QuerySync<Query, Document>, target: SyncState) {
    let mut changes = sync.state_changes();
    tokio::time::timeout(Duration::from_secs(2), changes.wait_for(|state| *state == target))
        .await
        .expect("timed out waiting for sync state")
        .expect("state channel closed");
}

/// Poll `condition` until it holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
