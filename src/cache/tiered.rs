//! Two-tier cache: a live entry and a longer-lived stale shadow per key.
//!
//! ```text
//! set(key, v, ttl)
//!     → "key:stale"  { value, cached_at }                 ttl × stale_multiplier
//!     → "key"        { key, value, stored_at, ttl_seconds } ttl
//! ```
//!
//! The shadow outlives the live entry, so a later live miss can still be
//! answered with a recent value instead of nothing. Store failures never
//! reach callers: reads become misses and writes are skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::cache::store::{KvStore, StoreError};
use crate::cache::ttl::TtlTable;
use crate::observability::metrics;

/// Live cache entry as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub stored_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

/// Stale shadow entry as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleEntry {
    pub value: Value,
    pub cached_at: DateTime<Utc>,
}

/// Key of the stale shadow for `key`.
pub fn stale_key(key: &str) -> String {
    format!("{key}:stale")
}

/// Live + stale cache over a [`KvStore`].
#[derive(Clone)]
pub struct TieredCache {
    store: Arc<dyn KvStore>,
    ttls: Arc<TtlTable>,
    stale_multiplier: u64,
}

impl TieredCache {
    pub fn new(store: Arc<dyn KvStore>, ttls: TtlTable, stale_multiplier: u64) -> Self {
        Self {
            store,
            ttls: Arc::new(ttls),
            stale_multiplier: stale_multiplier.max(1),
        }
    }

    /// Live value for `key`, if present and unexpired.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.get_entry(key).await.map(|entry| entry.value)
    }

    pub async fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.read::<CacheEntry>(key).await;
        metrics::record_cache_lookup("live", entry.is_some());
        entry
    }

    /// Stale shadow for `key`, if present.
    pub async fn get_stale(&self, key: &str) -> Option<StaleEntry> {
        let entry = self.read::<StaleEntry>(&stale_key(key)).await;
        metrics::record_cache_lookup("stale", entry.is_some());
        entry
    }

    /// Write the live entry with `ttl_secs` and its shadow with
    /// `ttl_secs × stale_multiplier`. Returns false if the write was skipped.
    pub async fn set(&self, key: &str, value: &Value, ttl_secs: u64) -> bool {
        let now = Utc::now();
        let stale = StaleEntry {
            value: value.clone(),
            cached_at: now,
        };
        let live = CacheEntry {
            key: key.to_string(),
            value: value.clone(),
            stored_at: now,
            ttl_seconds: ttl_secs,
        };

        // Shadow first: a live entry must never be newer than its shadow.
        let stale_ttl = ttl_secs.saturating_mul(self.stale_multiplier);
        if let Err(e) = self.write(&stale_key(key), stale_ttl, &stale).await {
            tracing::warn!(key, error = %e, "Cache write failed (stale tier), skipping live write");
            return false;
        }
        if let Err(e) = self.write(key, ttl_secs, &live).await {
            tracing::warn!(key, error = %e, "Cache write failed (live tier)");
            return false;
        }

        tracing::debug!(key, ttl_secs, stale_ttl, "Cached value");
        true
    }

    /// `set` with the TTL registered for `data_type`.
    pub async fn set_with_smart_ttl(&self, key: &str, value: &Value, data_type: &str) -> bool {
        self.set(key, value, self.ttls.ttl_for(data_type)).await
    }

    pub fn ttl_for(&self, data_type: &str) -> u64 {
        self.ttls.ttl_for(data_type)
    }

    /// Remove both tiers of `key`. Returns true if anything was removed.
    pub async fn invalidate(&self, key: &str) -> bool {
        let live = self.store.del(key).await;
        let stale = self.store.del(&stale_key(key)).await;
        match (live, stale) {
            (Ok(a), Ok(b)) => a || b,
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(key, error = %e, "Cache invalidation failed");
                false
            }
        }
    }

    pub async fn flush_all(&self) -> bool {
        match self.store.flush_all().await {
            Ok(()) => {
                tracing::info!("Cache flushed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cache flush failed");
                false
            }
        }
    }

    async fn read<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Corrupt cache entry, treating as miss");
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &str, ttl_secs: u64, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.store.set_ex(key, ttl_secs, raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    fn cache() -> TieredCache {
        TieredCache::new(Arc::new(MemoryStore::new()), TtlTable::builtin(), 4)
    }

    struct BrokenStore;

    #[async_trait]
    impl KvStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn set_ex(&self, _key: &str, _ttl: u64, _value: String) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn del(&self, _key: &str) -> Result<bool, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn flush_all(&self) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_shadow_outlives_live_entry() {
        let cache = cache();
        let value = json!({ "tvl": 1234.5 });
        assert!(cache.set("defillama:tvl:aave", &value, 100).await);

        assert_eq!(cache.get("defillama:tvl:aave").await, Some(value.clone()));

        tokio::time::advance(Duration::from_secs(101)).await;
        assert_eq!(cache.get("defillama:tvl:aave").await, None);
        let stale = cache.get_stale("defillama:tvl:aave").await.unwrap();
        assert_eq!(stale.value, value);

        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(cache.get_stale("defillama:tvl:aave").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ttl_is_written() {
        let cache = cache();
        assert!(cache.set("k", &json!(1), u64::MAX / 2).await);
        assert_eq!(cache.get("k").await, Some(json!(1)));
        assert_eq!(cache.get_stale("k").await.unwrap().value, json!(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shadow_is_stamped_with_write_time() {
        let cache = cache();
        cache.set("k", &json!(1), 10).await;
        let live = cache.get_entry("k").await.unwrap();
        let stale = cache.get_stale("k").await.unwrap();
        assert!(stale.cached_at >= live.stored_at);
        assert_eq!(live.ttl_seconds, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_smart_ttl_uses_data_type() {
        let cache = cache();
        cache.set_with_smart_ttl("price", &json!({ "price": 1.0 }), "token-price").await;
        assert_eq!(cache.get_entry("price").await.unwrap().ttl_seconds, 300);

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(cache.get("price").await.is_none());
        assert!(cache.get_stale("price").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_removes_both_tiers() {
        let cache = cache();
        cache.set("k", &json!(1), 10).await;
        assert!(cache.invalidate("k").await);
        assert!(cache.get("k").await.is_none());
        assert!(cache.get_stale("k").await.is_none());
        assert!(!cache.invalidate("k").await);
    }

    #[tokio::test]
    async fn test_store_errors_are_swallowed() {
        let cache = TieredCache::new(Arc::new(BrokenStore), TtlTable::builtin(), 4);
        assert!(cache.get("k").await.is_none());
        assert!(cache.get_stale("k").await.is_none());
        assert!(!cache.set("k", &json!(1), 10).await);
        assert!(!cache.invalidate("k").await);
        assert!(!cache.flush_all().await);
    }
}
