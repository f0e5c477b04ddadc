//! In-memory LRU+TTL cache for idempotent GET responses.
//!
//! Translated from `original_source/3/src/cache.py`'s
//! `InMemoryLRUAPICache`: a bounded map keyed by a canonical request
//! signature, evicted both by time-to-live and by least-recent-use once
//! `maxlen` is exceeded. Python leans on `collections.OrderedDict`
//! (`move_to_end` on hit, `popitem(last=False)` on overflow); there is no
//! equivalent off-the-shelf LRU in this crate's dependency stack, so the
//! recency order is tracked by hand with a `VecDeque` alongside the map.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// A cached response body plus its optional expiry. `expires_at ==
/// None` means the entry never expires on its own (only LRU eviction
/// can remove it), matching `original_source/3/src/cache.py`'s
/// `ttl: int | None = None`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub expires_at: Option<Instant>,
}

/// Keyed, TTL-bounded, size-bounded cache for API responses.
#[async_trait]
pub trait ApiCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    /// `ttl: None` inserts an entry that never expires on its own.
    async fn set(&self, key: String, value: Value, ttl: Option<Duration>);
    /// Drops all entries. Called during use-case shutdown.
    async fn close(&self);
}

struct Inner {
    entries: HashMap<String, CacheEntry>,
    /// Most-recently-used key is at the back.
    recency: VecDeque<String>,
}

/// Hand-rolled LRU+TTL cache, `tokio::sync::Mutex`-guarded for use from
/// concurrent request tasks.
pub struct LruTtlCache {
    maxlen: usize,
    inner: Mutex<Inner>,
}

impl LruTtlCache {
    pub fn new(maxlen: usize) -> Self {
        LruTtlCache {
            maxlen,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                recency: VecDeque::new(),
            }),
        }
    }

    fn touch(recency: &mut VecDeque<String>, key: &str) {
        if let Some(pos) = recency.iter().position(|k| k == key) {
            recency.remove(pos);
        }
        recency.push_back(key.to_string());
    }
}

#[async_trait]
impl ApiCache for LruTtlCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock().await;
        let expired = match inner.entries.get(key) {
            Some(entry) => entry.expires_at.is_some_and(|at| Instant::now() >= at),
            None => return None,
        };
        if expired {
            inner.entries.remove(key);
            if let Some(pos) = inner.recency.iter().position(|k| k == key) {
                inner.recency.remove(pos);
            }
            trace!(key, "cache entry expired");
            return None;
        }
        Self::touch(&mut inner.recency, key);
        inner.entries.get(key).map(|e| e.value.clone())
    }

    async fn set(&self, key: String, value: Value, ttl: Option<Duration>) {
        let mut inner = self.inner.lock().await;
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        if inner.entries.contains_key(&key) {
            Self::touch(&mut inner.recency, &key);
        } else {
            if inner.entries.len() >= self.maxlen {
                if let Some(oldest) = inner.recency.pop_front() {
                    inner.entries.remove(&oldest);
                    trace!(key = oldest, "evicted least-recently-used cache entry");
                }
            }
            inner.recency.push_back(key.clone());
        }
        inner.entries.insert(key, CacheEntry { value, expires_at });
    }

    async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        inner.recency.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_miss_returns_none() {
        let cache = LruTtlCache::new(10);
        assert!(cache.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = LruTtlCache::new(10);
        cache
            .set("k".to_string(), Value::String("v".to_string()), Some(Duration::from_secs(60)))
            .await;
        assert_eq!(cache.get("k").await, Some(Value::String("v".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = LruTtlCache::new(10);
        cache
            .set("k".to_string(), Value::String("v".to_string()), Some(Duration::from_millis(10)))
            .await;
        tokio::time::advance(Duration::from_millis(11)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_with_no_ttl_never_expire() {
        let cache = LruTtlCache::new(10);
        cache
            .set("k".to_string(), Value::String("v".to_string()), None)
            .await;
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(cache.get("k").await, Some(Value::String("v".to_string())));
    }

    #[tokio::test]
    async fn overflow_evicts_least_recently_used() {
        let cache = LruTtlCache::new(2);
        cache.set("a".to_string(), Value::Bool(true), Some(Duration::from_secs(60))).await;
        cache.set("b".to_string(), Value::Bool(true), Some(Duration::from_secs(60))).await;
        // touch "a" so "b" becomes the least-recently-used entry
        cache.get("a").await;
        cache.set("c".to_string(), Value::Bool(true), Some(Duration::from_secs(60))).await;

        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn close_clears_all_entries() {
        let cache = LruTtlCache::new(10);
        cache.set("k".to_string(), Value::Bool(true), Some(Duration::from_secs(60))).await;
        cache.close().await;
        assert!(cache.get("k").await.is_none());
    }
}
