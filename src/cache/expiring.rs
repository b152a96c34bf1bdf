//! Expiring Cache Module
//!
//! Public cache handle: the store, the expiry timer and the observer list
//! behind one cloneable value.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::{CacheStats, CacheStore, ExpiredEvent, Observers, SubscriptionId};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::tasks::ExpiryTimer;

// == Expiring Cache ==
/// In-memory key/value cache whose entries expire and notify observers.
///
/// Cloning the handle shares the same cache. Operations are synchronous and
/// never block on the timer; expiration runs on a tokio task that wakes once
/// at the earliest deadline.
///
/// Observers are owned by the cache, so a handler that captures a clone of
/// the cache keeps it alive until the handler is removed. Capture a
/// [`WeakExpiringCache`] from [`downgrade`](Self::downgrade) instead.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use expiring_cache::{Config, ExpiringCache};
///
/// #[tokio::main]
/// async fn main() {
///     let cache = ExpiringCache::new(Config::from(100));
///     cache.on_expired(|event| println!("{} expired", event.key));
///
///     cache.set("session", "abc".to_string(), None);
///     tokio::time::sleep(Duration::from_millis(150)).await;
///     assert!(cache.is_empty());
/// }
/// ```
pub struct ExpiringCache<V> {
    shared: Arc<Shared<V>>,
}

struct Shared<V> {
    state: Mutex<State<V>>,
    observers: Observers<V>,
}

struct State<V> {
    store: CacheStore<V>,
    timer: ExpiryTimer,
}

impl<V> Clone for ExpiringCache<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Non-owning handle to an [`ExpiringCache`].
pub struct WeakExpiringCache<V> {
    shared: Weak<Shared<V>>,
}

impl<V> WeakExpiringCache<V> {
    /// Returns the cache if any strong handle is still alive.
    pub fn upgrade(&self) -> Option<ExpiringCache<V>> {
        self.shared.upgrade().map(|shared| ExpiringCache { shared })
    }
}

impl<V> Clone for WeakExpiringCache<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<V> std::fmt::Debug for WeakExpiringCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakExpiringCache")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

impl<V> ExpiringCache<V> {
    /// Creates a handle that does not keep the cache alive.
    pub fn downgrade(&self) -> WeakExpiringCache<V> {
        WeakExpiringCache {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl<V: Clone + Send + 'static> ExpiringCache<V> {
    // == Constructor ==
    /// Creates a new cache.
    ///
    /// # Panics
    ///
    /// Panics if timeouts are enabled and this is called outside of a tokio
    /// runtime. Use [`try_new`](Self::try_new) to get an error instead.
    pub fn new(config: impl Into<Config>) -> Self {
        match Self::try_new(config) {
            Ok(cache) => cache,
            Err(err) => panic!("{}", err),
        }
    }

    /// Creates a new cache, failing if timeouts are enabled without a tokio
    /// runtime to drive them.
    pub fn try_new(config: impl Into<Config>) -> Result<Self> {
        let config = config.into();
        let runtime = Handle::try_current().ok();
        if config.timeouts_enabled && runtime.is_none() {
            return Err(CacheError::RuntimeUnavailable);
        }

        info!(
            "Cache created: default_timeout={}ms, renew_on_access={}, timeouts_enabled={}",
            config.default_timeout.as_millis(),
            config.renew_on_access,
            config.timeouts_enabled
        );

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    store: CacheStore::new(config),
                    timer: ExpiryTimer::new(runtime),
                }),
                observers: Observers::new(),
            }),
        })
    }

    // == Set ==
    /// Inserts or updates an entry.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `timeout` - Optional timeout for this entry (uses the default if None or zero)
    pub fn set(&self, key: impl Into<String>, value: V, timeout: Option<Duration>) {
        let mut state = self.shared.lock();
        state.store.set(key.into(), value, timeout, Instant::now());
        self.shared.reschedule(&mut state);
    }

    // == Get ==
    /// Returns the value for `key`, renewing its deadline unless renewal is
    /// disabled.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut state = self.shared.lock();
        let value = state.store.get(key, Instant::now());
        self.shared.reschedule(&mut state);
        value
    }

    /// Returns the value for `key` without renewing it.
    pub fn peek(&self, key: &str) -> Option<V> {
        self.shared.lock().store.peek(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.shared.lock().store.contains_key(key)
    }

    // == Remove ==
    /// Removes an entry, returning its value. No event is emitted.
    pub fn remove(&self, key: &str) -> Option<V> {
        let mut state = self.shared.lock();
        let value = state.store.remove(key);
        self.shared.reschedule(&mut state);
        value
    }

    // == Clean ==
    /// Drops every entry and cancels the pending wake-up. No events are emitted.
    pub fn clean(&self) {
        let mut state = self.shared.lock();
        state.store.clear();
        state.timer.disarm();
        debug!("Cache cleaned");
    }

    /// Remaining life of an entry, without renewing it.
    pub fn time_to_expire(&self, key: &str) -> Option<Duration> {
        self.shared
            .lock()
            .store
            .time_to_expire(key, Instant::now())
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.shared.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().store.is_empty()
    }

    // == Keys ==
    /// Snapshot of all keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.shared.lock().store.keys()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.shared.lock().store.stats()
    }

    pub fn config(&self) -> Config {
        self.shared.lock().store.config().clone()
    }

    // == Observers ==
    /// Registers a handler called for every expired entry.
    ///
    /// Handlers may call back into the cache. A handler holding a strong
    /// [`ExpiringCache`] clone forms a reference cycle with the observer
    /// list; use [`downgrade`](Self::downgrade) or remove the handler.
    pub fn on_expired<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ExpiredEvent<V>) + Send + Sync + 'static,
    {
        self.shared.observers.subscribe(handler)
    }

    /// Registers a channel receiving every expired entry.
    pub fn expired_events(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<ExpiredEvent<V>>) {
        self.shared.observers.channel()
    }

    /// Removes one handler. Returns false if it was not registered.
    pub fn remove_listener(&self, id: SubscriptionId) -> bool {
        self.shared.observers.unsubscribe(id)
    }

    pub fn remove_all_listeners(&self) {
        self.shared.observers.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.shared.observers.len()
    }
}

impl<V: Clone + Send + 'static> Shared<V> {
    fn lock(&self) -> MutexGuard<'_, State<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Reschedule ==
    // Aligns the timer with the earliest deadline; no-op when already aligned.
    fn reschedule(self: &Arc<Self>, state: &mut State<V>) {
        let next = state.store.next_deadline();
        if next == state.timer.armed_deadline() {
            return;
        }

        match next {
            Some(deadline) => {
                let weak: Weak<Self> = Arc::downgrade(self);
                state.timer.arm(deadline, Instant::now(), move |generation| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_timer(generation);
                    }
                });
            }
            None => state.timer.disarm(),
        }
    }

    // == On Timer ==
    // Sweeps due entries and re-arms under the lock, then notifies without it.
    fn on_timer(self: &Arc<Self>, generation: u64) {
        let expired = {
            let mut state = self.lock();
            if !state.timer.fired(generation) {
                return;
            }
            let expired = state.store.expire(Instant::now());
            self.reschedule(&mut state);
            expired
        };

        if !expired.is_empty() {
            debug!(expired = expired.len(), "Expiry sweep completed");
        }

        for event in &expired {
            self.observers.notify(event);
        }
    }
}

impl<V> std::fmt::Debug for ExpiringCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("observers", &self.shared.observers)
            .finish_non_exhaustive()
    }
}
