//! Cache lifecycle events and the subscriber bus.
//!
//! Every terminal state change in the cache (add, update, remove, evict,
//! expire) produces a [`CacheEvent`] that is delivered synchronously to every
//! subscriber, in subscription order, on the thread that performed the
//! operation. The engine publishes while it still holds its state lock, so
//! the observed event stream matches the serial order of operations exactly.
//!
//! ## Subscriber contract
//!
//! - Callbacks run inline on the cache's hot path: they must be fast and must
//!   not block on I/O.
//! - Callbacks must not call back into the cache on the same thread; the
//!   engine lock is held during delivery.
//! - A panicking subscriber is caught and logged; it never disturbs the
//!   engine or the remaining subscribers.
//!
//! The bus is internally synchronized, so handlers may be registered and
//! removed while other threads are publishing.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use parking_lot::RwLock;
use tracing::warn;

/// What happened to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A new entry was created.
    Added,
    /// An existing entry's value (and possibly expiry) was replaced.
    Updated,
    /// An entry was deleted by an explicit caller request.
    Removed,
    /// An entry was displaced to make room for a new one.
    Evicted,
    /// An entry past its deadline was dropped on access.
    Expired,
}

/// A single lifecycle notification.
///
/// `value` is present for `Added` and `Updated`; `reason` is present for
/// `Evicted`. The timestamp is wall-clock time captured at emission.
#[derive(Debug)]
pub struct CacheEvent<V> {
    pub kind: EventKind,
    pub key: String,
    pub value: Option<Arc<V>>,
    pub reason: Option<&'static str>,
    pub timestamp: SystemTime,
}

impl<V> CacheEvent<V> {
    fn new(kind: EventKind, key: String) -> Self {
        Self {
            kind,
            key,
            value: None,
            reason: None,
            timestamp: SystemTime::now(),
        }
    }

    pub(crate) fn added(key: String, value: Arc<V>) -> Self {
        let mut event = Self::new(EventKind::Added, key);
        event.value = Some(value);
        event
    }

    pub(crate) fn updated(key: String, value: Arc<V>) -> Self {
        let mut event = Self::new(EventKind::Updated, key);
        event.value = Some(value);
        event
    }

    pub(crate) fn removed(key: String) -> Self {
        Self::new(EventKind::Removed, key)
    }

    pub(crate) fn evicted(key: String, reason: &'static str) -> Self {
        let mut event = Self::new(EventKind::Evicted, key);
        event.reason = Some(reason);
        event
    }

    pub(crate) fn expired(key: String) -> Self {
        Self::new(EventKind::Expired, key)
    }
}

// Hand-written so cloning does not demand V: Clone; the Arc is shared.
impl<V> Clone for CacheEvent<V> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            key: self.key.clone(),
            value: self.value.clone(),
            reason: self.reason,
            timestamp: self.timestamp,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Callback<V> = Arc<dyn Fn(&CacheEvent<V>) + Send + Sync>;

struct Subscriber<V> {
    id: SubscriberId,
    callback: Callback<V>,
}

/// Ordered, internally synchronized registry of event subscribers.
pub struct EventBus<V> {
    subscribers: RwLock<Vec<Subscriber<V>>>,
    next_id: AtomicU64,
}

impl<V> EventBus<V> {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a callback; it will receive every subsequent event.
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&CacheEvent<V>) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push(Subscriber {
            id,
            callback: Arc::new(callback),
        });
        id
    }

    /// Removes a subscriber. Returns `false` if the id was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|sub| sub.id != id);
        subscribers.len() != before
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Delivers `event` to every subscriber in subscription order.
    ///
    /// The subscriber list is snapshotted first so a callback that
    /// subscribes or unsubscribes does not deadlock against the list lock.
    pub(crate) fn publish(&self, event: &CacheEvent<V>) {
        let snapshot: Vec<Callback<V>> = self
            .subscribers
            .read()
            .iter()
            .map(|sub| Arc::clone(&sub.callback))
            .collect();

        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!(kind = ?event.kind, key = %event.key, "cache event subscriber panicked");
            }
        }
    }
}

impl<V> std::fmt::Debug for EventBus<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
