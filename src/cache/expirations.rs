//! Expiration Index Module
//!
//! Keeps cache keys ordered by deadline for "next to expire" queries.

use std::collections::BTreeMap;

use tokio::time::Instant;

use crate::cache::entry::ExpirationKey;

// == Expiration Index ==
/// Ordered index of scheduled entries.
///
/// Keys are sorted ascending by `(expires_at, sequence)`:
/// - First = earliest deadline
/// - Equal deadlines keep placement order
#[derive(Debug, Default)]
pub struct ExpirationIndex {
    /// Placement -> cache key
    slots: BTreeMap<ExpirationKey, String>,
    /// Next sequence number to hand out
    next_sequence: u64,
}

impl ExpirationIndex {
    // == Constructor ==
    /// Creates a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert ==
    /// Places `key` at `expires_at` with a fresh sequence number.
    ///
    /// Returns the placement so the owner can remove it later.
    pub fn insert(&mut self, key: String, expires_at: Instant) -> ExpirationKey {
        let slot = ExpirationKey {
            expires_at,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        self.slots.insert(slot, key);
        slot
    }

    // == Remove ==
    /// Removes a placement. Returns the key it held, if it was present.
    pub fn remove(&mut self, slot: &ExpirationKey) -> Option<String> {
        self.slots.remove(slot)
    }

    // == Peek Earliest ==
    /// Returns the earliest placement without removing it.
    pub fn earliest(&self) -> Option<(&ExpirationKey, &String)> {
        self.slots.first_key_value()
    }

    /// Deadline of the earliest placement.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.earliest().map(|(slot, _)| slot.expires_at)
    }

    // == Drain Due ==
    /// Removes and returns every key whose deadline is at or before `now`,
    /// earliest first. Placements after `now` are left untouched.
    pub fn drain_due(&mut self, now: Instant) -> Vec<String> {
        let mut due = Vec::new();
        while let Some(entry) = self.slots.first_entry() {
            if entry.key().expires_at > now {
                break;
            }
            due.push(entry.remove());
        }
        due
    }

    // == Clear ==
    /// Removes every placement. Sequence numbering continues.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    // == Length ==
    /// Returns the number of scheduled keys.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates keys in expiration order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.slots.values()
    }
}
