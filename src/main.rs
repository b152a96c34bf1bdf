//! Expiring Cache demo
//!
//! Fills a cache with a few entries of staggered timeouts and logs every
//! expiration until the cache is empty or the process is interrupted.
//!
//! Usage: `expiring_cache [OPTIONS_JSON]`, e.g. `expiring_cache '{"timeout": 500}'`.
//! Without an argument the configuration is read from environment variables.

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use expiring_cache::{CacheOptions, Config, ExpiredEvent, ExpiringCache};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "expiring_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(json) => Config::from(
            CacheOptions::from_json(&json).context("failed to parse options argument")?,
        ),
        None => Config::from_env(),
    };

    let cache = ExpiringCache::try_new(config)?;
    let (_, mut expired) = cache.expired_events();

    let default_timeout = cache.config().default_timeout;
    for (i, key) in ["alpha", "beta", "gamma", "delta"].into_iter().enumerate() {
        let timeout = default_timeout / 4 * (i as u32 + 1);
        cache.set(key, format!("value-{}", i), Some(timeout));
    }
    // Same deadline as "delta", expires right after it
    cache.set("epsilon", "value-4".to_string(), Some(default_timeout));
    info!("Inserted {} entries: {:?}", cache.len(), cache.keys());

    // Keep "alpha" alive for a while by reading it
    let reader = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for _ in 0..3 {
                tokio::time::sleep(default_timeout / 8).await;
                if cache.get("alpha").is_none() {
                    break;
                }
            }
        })
    };

    if !cache.config().timeouts_enabled {
        info!("Timeouts disabled, nothing will expire");
    }

    while cache.config().timeouts_enabled {
        tokio::select! {
            event = expired.recv() => {
                let Some(event) = event else { break };
                log_expired(&event, cache.len());
                if cache.is_empty() {
                    // Entries swept together with the last one are already queued
                    while let Ok(event) = expired.try_recv() {
                        log_expired(&event, 0);
                    }
                    break;
                }
            }
            _ = signal::ctrl_c() => {
                warn!("Received Ctrl+C, discarding {} entries", cache.len());
                cache.clean();
                break;
            }
        }
    }

    reader.abort();
    let stats = cache.stats();
    info!("Final stats: {}", serde_json::to_string(&stats)?);

    Ok(())
}

fn log_expired(event: &ExpiredEvent<String>, remaining: usize) {
    info!(key = %event.key, value = %event.value, remaining, "Entry expired");
}
