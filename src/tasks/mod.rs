//! Background Tasks Module
//!
//! Contains the tasks that run alongside the cache.
//!
//! # Tasks
//! - Expiry Timer: wakes once at the earliest deadline and triggers the sweep

mod expiry_timer;

pub use expiry_timer::{ExpiryTimer, MIN_TIMER_DELAY};
