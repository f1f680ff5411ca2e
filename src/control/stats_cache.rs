//! Statistics cache (spec.md §4.8): queue counters and worker status cached
//! for 3s; concurrent misses on the same key are coalesced into a single
//! outstanding fetch; bounded LRU eviction keeps the cache itself cheap.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::{Mutex, Notify};

use crate::error::Result;

const TTL: Duration = Duration::from_secs(3);
const CAPACITY: usize = 100;

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// One outstanding fetch per key; the loser of a race awaits the winner's
/// `Notify` instead of issuing a duplicate query (spec.md §4.8: "coalesced
/// by sharing the pending fetch").
enum Slot {
    Ready(Entry),
    Pending(Arc<Notify>),
}

pub struct StatsCache {
    inner: Mutex<LruCache<String, Slot>>,
}

impl Default for StatsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LruCache::new(NonZeroUsize::new(CAPACITY).expect("nonzero"))),
        }
    }

    /// Fetch `key`, calling `fetcher` on a genuine miss. Concurrent callers
    /// for the same key during a miss share the single in-flight fetch.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetcher: F) -> Result<serde_json::Value>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<serde_json::Value>>,
    {
        loop {
            // `Notified` must be constructed while the guard is still held,
            // registering the waiter before the lock (and thus the race
            // with the winner's `notify_waiters()`) is released. Awaiting a
            // `Notify` clone obtained *after* dropping the guard can miss a
            // wakeup that fires in between: `notify_waiters()` wakes only
            // currently-registered waiters and stores no permit.
            let notified_fut = {
                let mut guard = self.inner.lock().await;
                match guard.get(key) {
                    Some(Slot::Ready(entry)) if entry.expires_at > Instant::now() => {
                        return Ok(entry.value.clone());
                    }
                    Some(Slot::Pending(notify)) => Some(notify.clone().notified_owned()),
                    _ => {
                        guard.put(key.to_string(), Slot::Pending(Arc::new(Notify::new())));
                        None
                    }
                }
            };

            if let Some(notified) = notified_fut {
                notified.await;
                continue;
            }

            let result = fetcher().await;

            let mut guard = self.inner.lock().await;
            let notify = match guard.pop(key) {
                Some(Slot::Pending(notify)) => notify,
                _ => Arc::new(Notify::new()),
            };

            match &result {
                Ok(value) => {
                    guard.put(
                        key.to_string(),
                        Slot::Ready(Entry { value: value.clone(), expires_at: Instant::now() + TTL }),
                    );
                }
                Err(_) => {
                    // Leave the key absent so the next caller retries the fetch.
                }
            }
            drop(guard);
            notify.notify_waiters();

            return result;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn caches_successful_fetch() {
        let cache = StatsCache::new();
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let value = cache
                .get_or_fetch("queue:stats", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(serde_json::json!({"waiting": 1}))
                })
                .await
                .unwrap();
            assert_eq!(value["waiting"], 1);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_misses_coalesce_into_one_fetch() {
        let cache = Arc::new(StatsCache::new());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("queue:stats", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(serde_json::json!({"waiting": 5}))
                    })
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
