//! Cache Module
//!
//! Provides the in-memory entry table, its expiration index and the
//! expiring cache handle built on top of them.

mod entry;
mod events;
mod expirations;
mod expiring;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, ExpirationKey};
pub use events::{ExpiredEvent, Observers, SubscriptionId};
pub use expirations::ExpirationIndex;
pub use expiring::{ExpiringCache, WeakExpiringCache};
pub use stats::CacheStats;
pub use store::{CacheStore, MAX_ENTRY_TIMEOUT};
