//! Expiring Cache - an in-memory key/value store with timed entries
//!
//! Every entry carries a deadline. A single timer wakes at the earliest one,
//! drops everything that is due and notifies observers with the expired
//! key and value.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheStats, ExpiredEvent, ExpiringCache, SubscriptionId, WeakExpiringCache};
pub use config::{CacheOptions, Config};
pub use error::{CacheError, Result};
