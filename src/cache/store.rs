//! Cache Store Module
//!
//! Entry table combined with the expiration index. Every operation on the
//! table is mirrored on the index so the two never disagree.
//!
//! The store is synchronous and takes the current time as a parameter; timer
//! handling lives in [`crate::tasks::ExpiryTimer`].

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::cache::{CacheEntry, CacheStats, ExpirationIndex, ExpiredEvent};
use crate::config::Config;

/// Longest timeout an entry can carry; longer ones are cut down to it.
pub const MAX_ENTRY_TIMEOUT: Duration = Duration::from_secs(86_400 * 365 * 30);

// == Cache Store ==
/// Entry table and expiration index.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Keys ordered by deadline
    expirations: ExpirationIndex,
    /// Performance statistics
    stats: CacheStats,
    /// Next insertion number for new keys
    next_inception: u64,
    /// Immutable settings
    config: Config,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new(config: Config) -> Self {
        Self {
            entries: HashMap::new(),
            expirations: ExpirationIndex::new(),
            stats: CacheStats::new(),
            next_inception: 0,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // == Set ==
    /// Inserts a new entry or replaces the value and timeout of an existing one.
    ///
    /// An existing key keeps its position in [`keys`](Self::keys). With timeouts
    /// enabled the entry is rescheduled at `now + timeout`.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `timeout` - Optional timeout (uses the configured default if None or zero,
    ///   capped at [`MAX_ENTRY_TIMEOUT`])
    /// * `now` - Base time for the new deadline
    pub fn set(&mut self, key: String, value: V, timeout: Option<Duration>, now: Instant) {
        let timeout = timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(self.config.default_timeout)
            .min(MAX_ENTRY_TIMEOUT);

        match self.entries.get_mut(&key) {
            Some(entry) => {
                if let Some(slot) = entry.slot.take() {
                    self.expirations.remove(&slot);
                }
                entry.value = value;
                entry.timeout = timeout;
            }
            None => {
                let entry = CacheEntry::new(value, timeout, self.next_inception);
                self.next_inception += 1;
                self.entries.insert(key.clone(), entry);
            }
        }

        if self.config.timeouts_enabled {
            self.schedule(&key, now);
        }

        trace!(key = %key, timeout_ms = timeout.as_millis() as u64, "entry set");
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// When timeouts and renewal are enabled the entry is rescheduled at
    /// `now + timeout` with a fresh sequence number.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<V> {
        let renew = self.config.timeouts_enabled && self.config.renew_on_access;

        let Some(entry) = self.entries.get(key) else {
            self.stats.record_miss();
            return None;
        };
        let value = entry.value.clone();
        self.stats.record_hit();

        if renew {
            self.schedule(key, now);
            self.stats.record_renewal();
        }

        Some(value)
    }

    // == Peek ==
    /// Retrieves a value without touching its deadline or the statistics.
    pub fn peek(&self, key: &str) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    // == Remove ==
    /// Removes an entry by key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let entry = self.entries.remove(key)?;
        if let Some(slot) = entry.slot {
            self.expirations.remove(&slot);
        }

        self.stats.record_removal();
        self.stats.set_total_entries(self.entries.len());
        Some(entry.value)
    }

    // == Clear ==
    /// Drops every entry without reporting them as expired.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.expirations.clear();
        self.stats.set_total_entries(0);
    }

    // == Expire ==
    /// Removes every entry whose deadline is at or before `now`.
    ///
    /// Both structures are updated before returning. Events come back in
    /// ascending deadline order, ties in placement order.
    pub fn expire(&mut self, now: Instant) -> Vec<ExpiredEvent<V>> {
        let expired: Vec<ExpiredEvent<V>> = self
            .expirations
            .drain_due(now)
            .into_iter()
            .filter_map(|key| {
                self.entries
                    .remove(&key)
                    .map(|entry| ExpiredEvent::new(key, entry.value))
            })
            .collect();

        self.stats.record_expirations(expired.len());
        self.stats.set_total_entries(self.entries.len());
        expired
    }

    // == Time To Expire ==
    /// Remaining life of an entry, None if absent or never expiring.
    pub fn time_to_expire(&self, key: &str, now: Instant) -> Option<Duration> {
        self.entries.get(key)?.time_to_expire(now)
    }

    /// Deadline of the entry that expires first.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.expirations.next_deadline()
    }

    // == Keys ==
    /// Snapshot of all keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        let mut keyed: Vec<(u64, &String)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.inception, key))
            .collect();
        keyed.sort_unstable_by_key(|(inception, _)| *inception);
        keyed.into_iter().map(|(_, key)| key.clone()).collect()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries currently scheduled to expire.
    pub fn scheduled(&self) -> usize {
        self.expirations.len()
    }

    // Moves an existing entry to `now + timeout` in the index.
    fn schedule(&mut self, key: &str, now: Instant) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        let expires_at = now
            .checked_add(entry.timeout)
            .unwrap_or_else(|| now + MAX_ENTRY_TIMEOUT);
        if let Some(slot) = entry.slot.take() {
            self.expirations.remove(&slot);
        }
        entry.slot = Some(self.expirations.insert(key.to_string(), expires_at));
    }
}
