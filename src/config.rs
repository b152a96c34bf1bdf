//! Configuration Module
//!
//! Handles loading and managing cache configuration, either from environment
//! variables or from a JSON options document.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::Result;

/// Default timeout applied to entries set without an explicit one
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Cache configuration parameters.
///
/// Immutable once the cache has been built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Timeout for entries set without an explicit one
    pub default_timeout: Duration,
    /// Whether a `get` pushes the entry's deadline back
    pub renew_on_access: bool,
    /// Whether entries expire at all
    pub timeouts_enabled: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TIMEOUT_MS` - Default entry timeout in milliseconds (default: 60000)
    /// - `CACHE_DOES_NOT_RENEW_TIMEOUT` - Disable renewal on access (default: false)
    /// - `CACHE_TIMEOUT_DISABLED` - Disable expiration entirely (default: false)
    pub fn from_env() -> Self {
        let timeout_ms = env::var("CACHE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        let does_not_renew: bool = env::var("CACHE_DOES_NOT_RENEW_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(false);
        let timeout_disabled: bool = env::var("CACHE_TIMEOUT_DISABLED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(false);

        Self {
            default_timeout: Duration::from_millis(timeout_ms),
            renew_on_access: !does_not_renew,
            timeouts_enabled: !timeout_disabled,
        }
    }

    /// Sets the default entry timeout. A zero duration keeps the current value.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.default_timeout = timeout;
        }
        self
    }

    /// Sets whether reads renew an entry's deadline.
    pub fn with_renew_on_access(mut self, renew: bool) -> Self {
        self.renew_on_access = renew;
        self
    }

    /// Enables or disables expiration.
    pub fn with_timeouts_enabled(mut self, enabled: bool) -> Self {
        self.timeouts_enabled = enabled;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            renew_on_access: true,
            timeouts_enabled: true,
        }
    }
}

/// Shorthand: a bare number of milliseconds is the default timeout.
impl From<u64> for Config {
    fn from(timeout_ms: u64) -> Self {
        Config::default().with_default_timeout(Duration::from_millis(timeout_ms))
    }
}

// == Options ==
/// External form of the cache configuration.
///
/// Accepts `null`, a bare number of milliseconds, or an object:
///
/// ```json
/// { "timeout": 100, "doesNotRenewTimeout": false, "timeoutDisabled": false }
/// ```
///
/// Unknown keys are ignored. Missing or wrongly typed values take their
/// defaults, and a document that is neither a number nor an object means
/// "no options". Only malformed JSON text is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOptions {
    /// No options given
    Unset,
    /// Default timeout in milliseconds
    Timeout(u64),
    /// Full option set
    Settings(OptionSettings),
}

/// Object form of [`CacheOptions`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSettings {
    pub timeout: Option<u64>,
    pub does_not_renew_timeout: bool,
    pub timeout_disabled: bool,
}

impl CacheOptions {
    /// Parses options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads options from an already parsed JSON value.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(_) => positive_millis(value).map_or(Self::Unset, Self::Timeout),
            Value::Object(fields) => {
                let flag = |name: &str| {
                    fields.get(name).and_then(Value::as_bool).unwrap_or(false)
                };
                Self::Settings(OptionSettings {
                    timeout: fields.get("timeout").and_then(positive_millis),
                    does_not_renew_timeout: flag("doesNotRenewTimeout"),
                    timeout_disabled: flag("timeoutDisabled"),
                })
            }
            _ => Self::Unset,
        }
    }
}

// Whole positive milliseconds only; anything else falls back to the default.
fn positive_millis(value: &Value) -> Option<u64> {
    value.as_u64().filter(|ms| *ms > 0)
}

impl<'de> Deserialize<'de> for CacheOptions {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(|value| Self::from_value(&value))
    }
}

impl From<CacheOptions> for Config {
    fn from(options: CacheOptions) -> Self {
        match options {
            CacheOptions::Unset => Config::default(),
            CacheOptions::Timeout(ms) => Config::from(ms),
            CacheOptions::Settings(settings) => Config::from(settings.timeout.unwrap_or(0))
                .with_renew_on_access(!settings.does_not_renew_timeout)
                .with_timeouts_enabled(!settings.timeout_disabled),
        }
    }
}
