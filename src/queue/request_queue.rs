//! Deduplicating, rate-limited, retrying executor for one upstream group.
//!
//! # Pipeline
//! ```text
//! enqueue(key, op)
//!     → pending map: join the in-flight future for `key`, or start one
//!     → spawned task:
//!         semaphore permit (concurrency bound)
//!         → circuit breaker admission (fail fast, no retries)
//!         → [sliding rate window → op() → retry with backoff]*
//!         → report the settled outcome to the breaker once
//!     → pending entry removed when the task settles, success or failure
//! ```
//!
//! The work runs in its own task so it settles, reports to the breaker and
//! clears its pending entry even if every waiting caller goes away.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::UpstreamConfig;
use crate::error::{UpstreamError, UpstreamResult};
use crate::observability::metrics;
use crate::queue::rate_window::SlidingWindow;
use crate::resilience::backoff::{calculate_backoff, with_jitter};
use crate::resilience::retries::is_retryable;
use crate::resilience::{CircuitBreaker, CircuitState};

type SharedOutcome = Shared<BoxFuture<'static, UpstreamResult<Value>>>;

/// Queue observability snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub name: String,
    pub concurrency: usize,
    pub requests_per_second: usize,
    pub pending_count: usize,
    pub active_count: usize,
    pub recent_request_count: usize,
    pub circuit_state: CircuitState,
    pub failure_count: u32,
}

struct QueueInner {
    name: String,
    config: UpstreamConfig,
    permits: Semaphore,
    window: SlidingWindow,
    pending: DashMap<String, SharedOutcome>,
    breaker: CircuitBreaker,
}

/// Request queue for one upstream group. Cheap to clone.
#[derive(Clone)]
pub struct RequestQueue {
    inner: Arc<QueueInner>,
}

impl RequestQueue {
    /// Build a queue and its circuit breaker from the group's settings.
    pub fn new(name: impl Into<String>, config: UpstreamConfig) -> Self {
        let name = name.into();
        let breaker = CircuitBreaker::new(
            name.clone(),
            config.breaker_threshold,
            config.breaker_timeout(),
        );
        Self {
            inner: Arc::new(QueueInner {
                permits: Semaphore::new(config.concurrency.max(1)),
                window: SlidingWindow::per_second(config.requests_per_second),
                pending: DashMap::new(),
                breaker,
                name,
                config,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.inner.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }

    /// Run `operation` for `key`, sharing the result with any concurrent
    /// caller that enqueues the same key.
    ///
    /// `operation` is invoked once per attempt.
    ///
    /// `max_pending` is approximate: the pending count is read before the
    /// key's entry is locked, so concurrent new keys can briefly exceed it.
    pub async fn enqueue<F, Fut>(&self, key: &str, operation: F) -> UpstreamResult<Value>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = UpstreamResult<Value>> + Send + 'static,
    {
        let inner = &self.inner;
        // Read before taking the entry; `len` locks every shard.
        let at_capacity = inner.pending.len() >= inner.config.max_pending;

        let shared = match inner.pending.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                tracing::debug!(upstream = %inner.name, key, "Joining in-flight request");
                metrics::record_dedup_join(&inner.name);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                if at_capacity {
                    tracing::warn!(
                        upstream = %inner.name,
                        key,
                        capacity = inner.config.max_pending,
                        "Queue full, rejecting request"
                    );
                    metrics::record_rejection(&inner.name, "queue_full");
                    return Err(UpstreamError::QueueFull {
                        group: inner.name.clone(),
                        capacity: inner.config.max_pending,
                    });
                }

                let guard = PendingGuard {
                    inner: inner.clone(),
                    key: key.to_string(),
                };
                let handle = tokio::spawn(async move {
                    let result = guard.inner.execute(&guard.key, operation).await;
                    drop(guard);
                    result
                });
                let shared = async move {
                    handle.await.unwrap_or_else(|e| {
                        Err(UpstreamError::Internal(format!("queued task failed: {e}")))
                    })
                }
                .boxed()
                .shared();

                entry.insert(shared.clone());
                shared
            }
        };

        shared.await
    }

    /// Stop admitting work. Queued and future calls fail with `QueueClosed`.
    pub fn close(&self) {
        self.inner.permits.close();
        tracing::info!(upstream = %self.inner.name, "Request queue closed");
    }

    pub fn status(&self) -> QueueStatus {
        let inner = &self.inner;
        let concurrency = inner.config.concurrency.max(1);
        let breaker = inner.breaker.snapshot();
        QueueStatus {
            name: inner.name.clone(),
            concurrency,
            requests_per_second: inner.window.limit(),
            pending_count: inner.pending.len(),
            active_count: concurrency.saturating_sub(inner.permits.available_permits()),
            recent_request_count: inner.window.recent_count(),
            circuit_state: breaker.state,
            failure_count: breaker.failure_count,
        }
    }
}

impl QueueInner {
    async fn execute<F, Fut>(&self, key: &str, operation: F) -> UpstreamResult<Value>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = UpstreamResult<Value>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| UpstreamError::QueueClosed)?;

        let admission = match self.breaker.admit() {
            Ok(admission) => admission,
            Err(e) => {
                tracing::debug!(upstream = %self.name, key, "Circuit open, failing fast");
                metrics::record_rejection(&self.name, "circuit_open");
                return Err(e);
            }
        };

        let mut attempt = 0u32;
        loop {
            self.window.acquire().await;

            let call = operation();
            match call.await {
                Ok(value) => {
                    metrics::record_attempt(&self.name, "success");
                    admission.succeed();
                    return Ok(value);
                }
                Err(error) => {
                    metrics::record_attempt(&self.name, "error");

                    if attempt >= self.config.retry_attempts || !is_retryable(&error) {
                        tracing::warn!(
                            upstream = %self.name,
                            key,
                            attempts = attempt + 1,
                            error = %error,
                            "Upstream request failed"
                        );
                        admission.fail();
                        return Err(error);
                    }

                    attempt += 1;
                    let mut delay =
                        calculate_backoff(attempt, self.config.base_delay_ms, self.config.max_delay_ms);
                    if self.config.jitter {
                        delay = with_jitter(delay);
                    }

                    tracing::info!(
                        upstream = %self.name,
                        key,
                        attempt,
                        delay = ?delay,
                        error = %error,
                        "Retrying upstream request"
                    );
                    metrics::record_retry(&self.name, error.kind());
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Removes the pending entry when the in-flight task settles or unwinds.
struct PendingGuard {
    inner: Arc<QueueInner>,
    key: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.inner.pending.remove(&self.key);
    }
}
