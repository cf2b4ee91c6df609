//! Key-value store seam and the bundled in-memory store.
//!
//! # Responsibilities
//! - Define the minimal contract the cache needs: get, set with expiry,
//!   delete, flush
//! - Provide a concurrent in-memory implementation with per-key expiry
//!
//! # Design Decisions
//! - Values are opaque strings; serialization belongs to the caller
//! - Expiry is the store's job; expired keys read as missing
//! - A TTL past the clock's range means the key never expires
//! - Last write wins for concurrent writers to one key

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Errors surfaced by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value store with per-key expiry.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_ex(&self, key: &str, ttl_secs: u64, value: String) -> Result<(), StoreError>;

    /// Returns true if a key was removed.
    async fn del(&self, key: &str) -> Result<bool, StoreError>;

    async fn flush_all(&self) -> Result<(), StoreError>;
}

#[derive(Debug)]
struct StoredValue {
    payload: String,
    /// `None` never expires.
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// A thread-safe in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held, including expired keys not yet evicted.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop every expired key. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, v| v.is_live(now));
        before.saturating_sub(self.inner.len())
    }

    /// Purge expired keys every `interval` until shutdown. Reads already skip
    /// expired keys; this only bounds memory held by keys nobody reads again.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = store.purge_expired();
                        if purged > 0 {
                            tracing::debug!(purged, remaining = store.len(), "Purged expired cache keys");
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        match self.inner.get(key) {
            None => return Ok(None),
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.payload.clone())),
            Some(_) => {}
        }
        // Lazily evict; the read guard above is already released.
        self.inner.remove_if(key, |_, v| !v.is_live(now));
        Ok(None)
    }

    async fn set_ex(&self, key: &str, ttl_secs: u64, value: String) -> Result<(), StoreError> {
        self.inner.insert(
            key.to_string(),
            StoredValue {
                payload: value,
                expires_at: Instant::now().checked_add(Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.inner.remove(key).is_some())
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        self.inner.clear();
        Ok(())
    }
}
