//! Expiration Events Module
//!
//! Observer list for the "expired" notification channel.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

// == Expired Event ==
/// Payload delivered to observers when an entry expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredEvent<V> {
    /// The expired key
    pub key: String,
    /// The value it held
    pub value: V,
}

impl<V> ExpiredEvent<V> {
    pub fn new(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Handle identifying one registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<V> = Arc<dyn Fn(&ExpiredEvent<V>) + Send + Sync>;

// == Observers ==
/// Registration-ordered list of expiration handlers.
///
/// Handlers run synchronously on a snapshot of the list, so a handler may
/// register or remove observers (itself included) while being notified.
pub struct Observers<V> {
    inner: Mutex<ObserverList<V>>,
}

struct ObserverList<V> {
    handlers: Vec<(SubscriptionId, Handler<V>)>,
    next_id: u64,
}

impl<V> Observers<V> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ObserverList {
                handlers: Vec::new(),
                next_id: 0,
            }),
        }
    }

    // == Subscribe ==
    /// Registers a handler. Handlers are notified in registration order.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ExpiredEvent<V>) + Send + Sync + 'static,
    {
        let mut list = self.lock();
        let id = SubscriptionId(list.next_id);
        list.next_id += 1;
        list.handlers.push((id, Arc::new(handler)));
        id
    }

    // == Unsubscribe ==
    /// Removes one handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut list = self.lock();
        let before = list.handlers.len();
        list.handlers.retain(|(handler_id, _)| *handler_id != id);
        list.handlers.len() != before
    }

    /// Removes every handler.
    pub fn clear(&self) {
        self.lock().handlers.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Notify ==
    /// Calls every handler registered at the time of the call.
    pub fn notify(&self, event: &ExpiredEvent<V>) {
        let snapshot: Vec<Handler<V>> = self
            .lock()
            .handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in snapshot {
            handler(event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ObserverList<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone + Send + 'static> Observers<V> {
    // == Channel Subscription ==
    /// Registers a handler forwarding every event into an unbounded channel.
    pub fn channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<ExpiredEvent<V>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(move |event: &ExpiredEvent<V>| {
            // Receiver gone: nothing left to deliver to
            let _ = tx.send(event.clone());
        });
        (id, rx)
    }
}

impl<V> Default for Observers<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for Observers<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("len", &self.len())
            .finish()
    }
}
