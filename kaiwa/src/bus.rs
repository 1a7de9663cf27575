//! Topic-based in-process publish/subscribe fabric.
//!
//! The [`EventBus`] fans events out to per-topic subscribers. A subscriber is
//! either *sync* (its handler runs inline on the publisher's task, in
//! publisher order) or *buffered* (it owns a bounded queue and a dedicated
//! delivery task; a full queue blocks the publisher until space frees). A
//! panicking handler is logged and swallowed; the subscriber stays
//! subscribed.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

use crate::event::Event;

/// Errors produced by the event bus.
#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum BusError {
    /// The bus has been closed; no new subscriptions or publishes.
    #[error("event bus is closed")]
    Closed,
}

/// Opaque handle identifying one subscription on one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(uuid::Uuid);

impl SubscriptionId {
    fn mint() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

/// Handler invoked with each delivered event.
pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;

enum Delivery {
    /// Runs on the publisher's task.
    Sync(EventHandler),
    /// Enqueues onto the subscriber's bounded queue.
    Buffered(mpsc::Sender<Event>),
}

impl Clone for Delivery {
    fn clone(&self) -> Self {
        match self {
            Self::Sync(handler) => Self::Sync(Arc::clone(handler)),
            Self::Buffered(tx) => Self::Buffered(tx.clone()),
        }
    }
}

struct Subscriber {
    id: SubscriptionId,
    delivery: Delivery,
}

struct BusInner {
    topics: RwLock<HashMap<String, Vec<Subscriber>>>,
    closed: AtomicBool,
}

/// A cheaply clonable handle to a shared event bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a new, open bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: RwLock::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// True once [`EventBus::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Subscribe a sync handler: it runs inline on the publisher's task.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] if the bus has been closed.
    pub async fn subscribe(
        &self,
        topic: impl Into<String>,
        handler: impl Fn(Event) + Send + Sync + 'static,
    ) -> Result<SubscriptionId, BusError> {
        self.add_subscriber(topic.into(), Delivery::Sync(Arc::new(handler)))
            .await
    }

    /// Subscribe a buffered handler: events are enqueued onto a bounded
    /// queue of `buffer` slots and delivered by a dedicated task. A full
    /// queue blocks the publisher until space frees.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] if the bus has been closed.
    pub async fn subscribe_buffered(
        &self,
        topic: impl Into<String>,
        buffer: usize,
        handler: impl Fn(Event) + Send + Sync + 'static,
    ) -> Result<SubscriptionId, BusError> {
        let (tx, mut rx) = mpsc::channel::<Event>(buffer.max(1));
        let handler: EventHandler = Arc::new(handler);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                invoke(&handler, event);
            }
        });
        self.add_subscriber(topic.into(), Delivery::Buffered(tx)).await
    }

    async fn add_subscriber(
        &self,
        topic: String,
        delivery: Delivery,
    ) -> Result<SubscriptionId, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        let id = SubscriptionId::mint();
        let mut topics = self.inner.topics.write().await;
        topics
            .entry(topic)
            .or_default()
            .push(Subscriber { id, delivery });
        Ok(id)
    }

    /// Remove a subscription. Idempotent; unknown ids and topics are
    /// ignored. A buffered subscriber's queue closes and its delivery task
    /// drains and exits.
    pub async fn unsubscribe(&self, topic: &str, id: SubscriptionId) {
        let mut topics = self.inner.topics.write().await;
        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.retain(|s| s.id != id);
            if subscribers.is_empty() {
                topics.remove(topic);
            }
        }
    }

    /// Publish an event to every current subscriber of its topic.
    ///
    /// Returns once every sync handler has run and every buffered
    /// subscriber has at least enqueued the event.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] if the bus has been closed.
    pub async fn publish(&self, event: Event) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        // Snapshot under the read lock, deliver outside it so a slow or
        // blocked subscriber cannot hold up subscribe/unsubscribe.
        let targets: Vec<Delivery> = {
            let topics = self.inner.topics.read().await;
            topics
                .get(&event.topic)
                .map(|subscribers| subscribers.iter().map(|s| s.delivery.clone()).collect())
                .unwrap_or_default()
        };

        for target in targets {
            match target {
                Delivery::Sync(handler) => invoke(&handler, event.clone()),
                Delivery::Buffered(tx) => {
                    if tx.send(event.clone()).await.is_err() {
                        debug!(topic = %event.topic, "buffered subscriber gone, dropping event");
                    }
                }
            }
        }
        Ok(())
    }

    /// Close the bus: no new subscriptions or publishes, every subscriber
    /// dropped (buffered queues drain and their tasks exit).
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.topics.write().await.clear();
    }
}

fn invoke(handler: &EventHandler, event: Event) {
    let topic = event.topic.clone();
    if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
        warn!(topic = %topic, "event handler panicked; subscriber kept");
    }
}
