//! Cache Entry Module
//!
//! Defines the structure for individual cache entries and their position in
//! the expiration index.

use std::time::Duration;

use tokio::time::Instant;

// == Expiration Key ==
/// Position of an entry in the expiration index.
///
/// Ordered by deadline first, then by sequence number. Sequence numbers are
/// unique, so two keys compare equal only when they are the same placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExpirationKey {
    /// Absolute deadline
    pub expires_at: Instant,
    /// Tie-breaker among equal deadlines, in placement order
    pub sequence: u64,
}

// == Cache Entry ==
/// Represents a single cache entry with value and expiration metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Duration used to compute each new deadline
    pub timeout: Duration,
    /// Current placement in the expiration index, None when timeouts are disabled
    pub slot: Option<ExpirationKey>,
    /// Insertion order into the entry table
    pub inception: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry that is not yet scheduled.
    pub fn new(value: V, timeout: Duration, inception: u64) -> Self {
        Self {
            value,
            timeout,
            slot: None,
            inception,
        }
    }

    /// Absolute deadline, or None if the entry never expires.
    pub fn expires_at(&self) -> Option<Instant> {
        self.slot.map(|slot| slot.expires_at)
    }

    // == Is Expired ==
    /// Checks whether the deadline has been reached at `now`.
    ///
    /// An entry is expired once `now >= expires_at`.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at() {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Time To Expire ==
    /// Returns the remaining life at `now`.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the deadline has passed
    /// - `Some(remaining)` if the entry is scheduled and still alive
    /// - `None` if the entry never expires
    pub fn time_to_expire(&self, now: Instant) -> Option<Duration> {
        self.expires_at()
            .map(|expires| expires.saturating_duration_since(now))
    }
}
