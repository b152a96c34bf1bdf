//! Integration Tests for Timer-Driven Expiration
//!
//! Runs the full cache (store, timer task and observers) on paused tokio time.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use expiring_cache::{CacheOptions, Config, ExpiredEvent, ExpiringCache};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout, Instant};

// == Helper Functions ==

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn recorded(cache: &ExpiringCache<String>) -> Arc<Mutex<Vec<(String, String)>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    cache.on_expired(move |event| {
        sink.lock()
            .unwrap()
            .push((event.key.clone(), event.value.clone()));
    });
    log
}

async fn next_event(rx: &mut UnboundedReceiver<ExpiredEvent<String>>) -> ExpiredEvent<String> {
    timeout(ms(10_000), rx.recv())
        .await
        .expect("no expiration within 10s")
        .expect("channel closed")
}

// == Construction ==

#[tokio::test(start_paused = true)]
async fn test_number_shorthand_sets_default_timeout() {
    let cache = ExpiringCache::new(Config::from(CacheOptions::from_json("100").unwrap()));
    let (_, mut rx) = cache.expired_events();

    let started = Instant::now();
    cache.set("foo", "bar".to_string(), None);

    let event = next_event(&mut rx).await;
    let delta = started.elapsed();

    assert_eq!(event, ExpiredEvent::new("foo", "bar".to_string()));
    assert!(delta >= ms(100), "expired early after {:?}", delta);
    assert!(delta < ms(200), "expired late after {:?}", delta);
}

#[tokio::test(start_paused = true)]
async fn test_new_cache_is_empty() {
    let cache: ExpiringCache<String> = ExpiringCache::new(Config::default());
    assert_eq!(cache.len(), 0);
    assert!(cache.keys().is_empty());
}

// == Set / Get / Remove ==

#[tokio::test(start_paused = true)]
async fn test_update_keeps_length_and_replaces_value() {
    let cache = ExpiringCache::new(Config::default());
    for i in [0, 4, 1, 3, 2] {
        cache.set(format!("foo{}", i), format!("bar{}", i), None);
    }

    cache.set("foo1", "baz".to_string(), None);
    assert_eq!(cache.len(), 5);
    assert_eq!(cache.get("foo1"), Some("baz".to_string()));
    assert_eq!(cache.len(), 5);
    assert_eq!(cache.get("missing"), None);
}

#[tokio::test(start_paused = true)]
async fn test_keys_and_remove() {
    let cache = ExpiringCache::new(Config::default());
    cache.set("k1", "v1".to_string(), None);
    cache.set("k2", "v2".to_string(), None);
    cache.set("k3", "v3".to_string(), None);

    assert_eq!(cache.keys(), ["k1", "k2", "k3"]);
    assert_eq!(cache.remove("k2"), Some("v2".to_string()));
    assert_eq!(cache.keys(), ["k1", "k3"]);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.remove("k2"), None);
    assert_eq!(cache.get("k2"), None);
}

#[tokio::test(start_paused = true)]
async fn test_remove_emits_no_event() {
    let cache = ExpiringCache::new(Config::default());
    let log = recorded(&cache);

    cache.set("a", "1".to_string(), Some(ms(50)));
    cache.set("b", "2".to_string(), Some(ms(80)));
    assert_eq!(cache.remove("a"), Some("1".to_string()));

    sleep(ms(100)).await;
    assert_eq!(*log.lock().unwrap(), [("b".to_string(), "2".to_string())]);
}

// == Expiration ==

#[tokio::test(start_paused = true)]
async fn test_expires_only_the_due_entry() {
    let cache = ExpiringCache::new(Config::default());
    let (_, mut rx) = cache.expired_events();

    let started = Instant::now();
    cache.set("foo0", "bar0".to_string(), None);
    cache.set("foo1", "bar1".to_string(), None);
    cache.set("foo2", "bar2".to_string(), Some(ms(100)));
    assert_eq!(cache.len(), 3);

    let event = next_event(&mut rx).await;
    assert_eq!(event.key, "foo2");
    assert_eq!(event.value, "bar2");
    assert!(started.elapsed() >= ms(100));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("foo2"), None);
}

#[tokio::test(start_paused = true)]
async fn test_expiration_follows_deadline_order() {
    let cache = ExpiringCache::new(Config::default());
    let log = recorded(&cache);

    cache.set("hundred", "1".to_string(), Some(ms(100)));
    cache.set("fifty", "2".to_string(), Some(ms(50)));
    cache.set("one-fifty", "3".to_string(), Some(ms(150)));

    sleep(ms(200)).await;

    let keys: Vec<String> = log.lock().unwrap().iter().map(|(k, _)| k.clone()).collect();
    assert_eq!(keys, ["fifty", "hundred", "one-fifty"]);
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_equal_deadlines_expire_in_insertion_order() {
    let cache = ExpiringCache::new(Config::default());
    let log = recorded(&cache);

    cache.set("a", "1".to_string(), Some(ms(100)));
    cache.set("b", "2".to_string(), Some(ms(100)));

    sleep(ms(150)).await;

    assert_eq!(
        *log.lock().unwrap(),
        [
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string())
        ]
    );
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.stats().expirations, 2);
}

#[tokio::test(start_paused = true)]
async fn test_each_entry_expires_exactly_once() {
    let cache = ExpiringCache::new(Config::default());
    let log = recorded(&cache);

    for i in 0..50u64 {
        cache.set(format!("k{}", i), i.to_string(), Some(ms(10 + (i * 7) % 90)));
    }

    sleep(ms(500)).await;

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 50);
    let mut keys: Vec<&String> = log.iter().map(|(k, _)| k).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 50);
}

// == Renewal ==

#[tokio::test(start_paused = true)]
async fn test_get_renews_timeout() {
    let cache = ExpiringCache::new(Config::default());
    let (_, mut rx) = cache.expired_events();

    let started = Instant::now();
    cache.set("foo0", "bar0".to_string(), None);
    cache.set("foo1", "bar1".to_string(), None);
    cache.set("foo2", "bar2".to_string(), Some(ms(100)));

    sleep(ms(60)).await;
    assert_eq!(cache.get("foo2"), Some("bar2".to_string()));
    sleep(ms(60)).await;
    assert_eq!(cache.get("foo2"), Some("bar2".to_string()));

    let event = next_event(&mut rx).await;
    assert_eq!(event.key, "foo2");
    assert!(started.elapsed() >= ms(220), "renewal ignored: {:?}", started.elapsed());
    assert_eq!(cache.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_access_keeps_entry_alive() {
    let cache = ExpiringCache::new(Config::default());
    let log = recorded(&cache);

    cache.set("hot", "v".to_string(), Some(ms(100)));
    for _ in 0..20 {
        sleep(ms(90)).await;
        assert_eq!(cache.get("hot"), Some("v".to_string()));
    }
    assert!(log.lock().unwrap().is_empty());

    sleep(ms(150)).await;
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_does_not_renew_timeout() {
    let options = CacheOptions::from_json(r#"{"doesNotRenewTimeout": true}"#).unwrap();
    let cache = ExpiringCache::new(Config::from(options));
    let (_, mut rx) = cache.expired_events();

    let started = Instant::now();
    cache.set("foo", "bar".to_string(), Some(ms(100)));
    sleep(ms(60)).await;
    assert_eq!(cache.get("foo"), Some("bar".to_string()));

    next_event(&mut rx).await;
    assert!(started.elapsed() < ms(150));
}

#[tokio::test(start_paused = true)]
async fn test_time_to_expire_does_not_renew() {
    let cache = ExpiringCache::new(Config::default());
    cache.set("foo", "bar".to_string(), Some(ms(100)));

    sleep(ms(40)).await;
    let remaining = cache.time_to_expire("foo").unwrap();
    assert!(remaining <= ms(60) && remaining >= ms(59), "{:?}", remaining);
    assert_eq!(cache.peek("foo"), Some("bar".to_string()));
    assert_eq!(cache.time_to_expire("foo"), Some(remaining));
    assert_eq!(cache.time_to_expire("missing"), None);
}

// == Re-entrancy ==

#[tokio::test(start_paused = true)]
async fn test_entry_added_from_handler_expires() {
    let cache = ExpiringCache::new(Config::default());
    let count = Arc::new(Mutex::new(0));
    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

    let handle = cache.clone();
    let counter = Arc::clone(&count);
    cache.on_expired(move |event| {
        let mut count = counter.lock().unwrap();
        *count += 1;
        assert_eq!(handle.get(&event.key), None, "expired key still visible");

        if *count == 2 {
            handle.remove_all_listeners();
            handle.set("foo2", "bar2".to_string(), Some(Duration::from_millis(100)));
            assert_eq!(handle.len(), 1);

            let inner = handle.clone();
            let done = done_tx.clone();
            handle.on_expired(move |event| {
                assert_eq!(event.key, "foo2");
                assert_eq!(inner.len(), 0);
                let _ = done.send(Instant::now());
            });
        }
    });

    let started = Instant::now();
    cache.set("foo0", "bar0".to_string(), Some(ms(100)));
    cache.set("foo1", "bar1".to_string(), Some(ms(100)));

    let fired_at = timeout(ms(10_000), done_rx.recv())
        .await
        .expect("entry added from handler never expired")
        .unwrap();
    assert!(fired_at.duration_since(started) >= ms(200));
    assert_eq!(*count.lock().unwrap(), 2);

    cache.remove_all_listeners();
}

#[tokio::test(start_paused = true)]
async fn test_handler_sees_consistent_state() {
    let cache = ExpiringCache::new(Config::default());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let weak = cache.downgrade();
    let sink = Arc::clone(&seen);
    cache.on_expired(move |event| {
        let Some(handle) = weak.upgrade() else { return };
        sink.lock()
            .unwrap()
            .push((event.key.clone(), handle.len(), handle.contains_key(&event.key)));
    });

    cache.set("a", "1".to_string(), Some(ms(50)));
    cache.set("b", "2".to_string(), Some(ms(50)));
    cache.set("c", "3".to_string(), Some(ms(500)));

    sleep(ms(100)).await;

    // Both removals are visible before the first notification
    assert_eq!(
        *seen.lock().unwrap(),
        [("a".to_string(), 1, false), ("b".to_string(), 1, false)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_listener_management() {
    let cache: ExpiringCache<String> = ExpiringCache::new(Config::default());
    let first = recorded(&cache);
    let second_log = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&second_log);
    let second = cache.on_expired(move |_| *counter.lock().unwrap() += 1);
    assert_eq!(cache.listener_count(), 2);

    assert!(cache.remove_listener(second));
    assert!(!cache.remove_listener(second));
    assert_eq!(cache.listener_count(), 1);

    cache.set("a", "1".to_string(), Some(ms(10)));
    sleep(ms(50)).await;

    assert_eq!(first.lock().unwrap().len(), 1);
    assert_eq!(*second_log.lock().unwrap(), 0);
}

// == Disabled Timeouts & Clean ==

#[tokio::test(start_paused = true)]
async fn test_timeouts_disabled_never_expire() {
    let options = CacheOptions::from_json(r#"{"timeoutDisabled": true}"#).unwrap();
    let cache = ExpiringCache::new(Config::from(options));
    let log = recorded(&cache);

    cache.set("foo0", "bar0".to_string(), None);
    cache.set("foo1", "bar1".to_string(), None);
    cache.set("foo2", "bar2".to_string(), Some(ms(100)));

    sleep(ms(200)).await;
    assert_eq!(cache.get("foo2"), Some("bar2".to_string()));

    sleep(ms(120_000)).await;
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(cache.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_clean_suppresses_pending_expirations() {
    let cache = ExpiringCache::new(Config::default());
    let log = recorded(&cache);

    cache.set("foo0", "bar0".to_string(), Some(ms(50)));
    cache.set("foo1", "bar1".to_string(), Some(ms(60)));
    assert_eq!(cache.len(), 2);

    cache.clean();
    assert_eq!(cache.len(), 0);
    assert!(cache.keys().is_empty());

    sleep(ms(200)).await;
    assert!(log.lock().unwrap().is_empty());

    // The cache keeps working after a clean
    cache.set("again", "v".to_string(), Some(ms(50)));
    sleep(ms(100)).await;
    assert_eq!(*log.lock().unwrap(), [("again".to_string(), "v".to_string())]);
}

// == Multi-threaded Runtime ==

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_expiration_on_multi_thread_runtime() {
    let cache = ExpiringCache::new(Config::from(30));
    let (_, mut rx) = cache.expired_events();

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let cache = cache.clone();
            tokio::spawn(async move {
                for i in 0..25 {
                    cache.set(format!("t{}-{}", t, i), i.to_string(), None);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    let mut received = 0;
    while received < 100 {
        next_event(&mut rx).await;
        received += 1;
    }
    assert!(cache.is_empty());
}

// == Batched Sweeps ==

#[tokio::test(start_paused = true)]
async fn test_shared_deadline_events_queued_before_cache_reads_empty() {
    let cache = ExpiringCache::new(Config::default());
    let (_, mut rx) = cache.expired_events();

    cache.set("delta", "3".to_string(), Some(ms(100)));
    cache.set("epsilon", "4".to_string(), Some(ms(100)));

    let first = next_event(&mut rx).await;
    assert_eq!(first.key, "delta");
    assert!(cache.is_empty());

    // Draining without awaiting still yields the rest of the sweep
    let rest: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|event| event.key)
        .collect();
    assert_eq!(rest, ["epsilon"]);
}

// == Timeout Bounds ==

#[tokio::test(start_paused = true)]
async fn test_huge_timeout_does_not_panic_or_expire() {
    let cache = ExpiringCache::new(Config::default());
    let (_, mut rx) = cache.expired_events();

    cache.set("short", "1".to_string(), Some(ms(50)));
    cache.set("short", "2".to_string(), Some(Duration::MAX));
    cache.set("other", "3".to_string(), Some(ms(100)));

    assert_eq!(next_event(&mut rx).await.key, "other");

    sleep(Duration::from_secs(3_600)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(cache.get("short"), Some("2".to_string()));
    assert_eq!(
        cache.time_to_expire("short"),
        Some(expiring_cache::cache::MAX_ENTRY_TIMEOUT)
    );
}
