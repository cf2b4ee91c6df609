//! Safe fetch: cache → queue + breaker guarded fetch → validate → cache.
//!
//! # Responsibilities
//! - Serve live cache hits without touching the upstream
//! - Run misses through the upstream's request queue, each attempt raced
//!   against a deadline with a cancellation token
//! - Validate fresh values against the last accepted value
//! - Fall back to the stale shadow, then to a zero-valued default
//!
//! # Design Decisions
//! - Never fails: callers always get a renderable [`FetchOutcome`]
//! - Implausible data is handled like an upstream failure and never cached

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cache::{StaleEntry, TieredCache};
use crate::error::UpstreamResult;
use crate::fetch::outcome::FetchOutcome;
use crate::observability::metrics;
use crate::queue::RequestQueue;
use crate::resilience::timeouts::with_deadline;
use crate::validation::{merge_with_stale, DataValidator};

/// Composes the tiered cache, an upstream queue and the validator.
#[derive(Clone)]
pub struct FetchOrchestrator {
    cache: TieredCache,
    validator: DataValidator,
}

impl FetchOrchestrator {
    pub fn new(cache: TieredCache, validator: DataValidator) -> Self {
        Self { cache, validator }
    }

    pub fn cache(&self) -> &TieredCache {
        &self.cache
    }

    pub fn validator(&self) -> &DataValidator {
        &self.validator
    }

    /// Return the value for `key`, fetching through `upstream` on a live miss.
    pub async fn safe_fetch<F, Fut>(
        &self,
        key: &str,
        upstream: &RequestQueue,
        timeout: Duration,
        data_type: &str,
        fetch: F,
    ) -> FetchOutcome
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = UpstreamResult<Value>> + Send + 'static,
    {
        if let Some(value) = self.cache.get(key).await {
            tracing::debug!(key, "Cache hit");
            metrics::record_fetch_outcome(data_type, "cached");
            return FetchOutcome::Cached(value);
        }
        self.refresh(key, upstream, timeout, data_type, fetch).await
    }

    /// Like [`safe_fetch`](Self::safe_fetch) but always goes upstream.
    pub async fn refresh<F, Fut>(
        &self,
        key: &str,
        upstream: &RequestQueue,
        timeout: Duration,
        data_type: &str,
        fetch: F,
    ) -> FetchOutcome
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = UpstreamResult<Value>> + Send + 'static,
    {
        let fetch = Arc::new(fetch);
        let result = upstream
            .enqueue(key, move || {
                let fetch = fetch.clone();
                async move { with_deadline(timeout, |token| fetch.as_ref()(token)).await }
            })
            .await;

        let stale = self.cache.get_stale(key).await;

        let outcome = match result {
            Ok(value) => self.accept(key, data_type, value, stale).await,
            Err(e) => {
                tracing::warn!(
                    key,
                    upstream = %upstream.name(),
                    error = %e,
                    "Upstream fetch failed, falling back"
                );
                self.fallback(data_type, stale, e.to_string())
            }
        };

        metrics::record_fetch_outcome(data_type, outcome.label());
        outcome
    }

    async fn accept(
        &self,
        key: &str,
        data_type: &str,
        value: Value,
        stale: Option<StaleEntry>,
    ) -> FetchOutcome {
        let previous = stale.as_ref().map(|s| &s.value);
        let verdict = self.validator.validate(&value, previous, data_type);
        if !verdict.is_valid {
            return self.fallback(data_type, stale, format!("validation failed: {}", verdict.reason));
        }

        let value = match &stale {
            Some(entry) if self.validator.profile(data_type).backfill => {
                let merged = merge_with_stale(&value, &entry.value);
                if !merged.backfilled.is_empty() {
                    tracing::info!(key, fields = ?merged.backfilled, "Backfilled fields from stale value");
                }
                merged.value
            }
            _ => value,
        };

        self.cache.set_with_smart_ttl(key, &value, data_type).await;
        FetchOutcome::Fresh(value)
    }

    fn fallback(&self, data_type: &str, stale: Option<StaleEntry>, reason: String) -> FetchOutcome {
        match stale {
            Some(entry) => FetchOutcome::Stale {
                value: entry.value,
                cached_at: entry.cached_at,
                reason,
            },
            None => FetchOutcome::Unavailable {
                value: self.validator.profile(data_type).default_value.clone(),
                reason,
            },
        }
    }
}
