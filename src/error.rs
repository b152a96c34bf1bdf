//! Error types for the expiring cache
//!
//! Provides unified error handling using thiserror. Cache operations themselves
//! never fail; errors only surface while building a cache.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the expiring cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Options could not be parsed
    #[error("Invalid cache options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    /// Timeouts are enabled but no tokio runtime is available to drive them
    #[error(
        "Expiry timer requires a tokio runtime; construct the cache inside one or disable timeouts"
    )]
    RuntimeUnavailable,
}

// == Result Type Alias ==
/// Convenience Result type for the expiring cache.
pub type Result<T> = std::result::Result<T, CacheError>;
