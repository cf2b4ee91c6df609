//! Periodic refresh of configured hot keys.
//!
//! # Responsibilities
//! - Refresh every target through the orchestrator on a fixed interval
//! - Collect per-key failures into a [`WarmupReport`]
//! - Record the completion time on the context for `/admin/last-refresh`

use chrono::{DateTime, Utc};
use futures_util::future::{join_all, BoxFuture};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::UpstreamResult;
use crate::fetch::FetchOutcome;
use crate::observability::metrics;
use crate::providers::HttpJsonProvider;
use crate::queue::RequestKey;

/// Type-erased provider adapter.
pub type FetchFn = Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, UpstreamResult<Value>> + Send + Sync>;

/// One hot key.
#[derive(Clone)]
pub struct WarmupTarget {
    pub key: RequestKey,
    pub upstream: String,
    pub data_type: String,
    pub fetch: FetchFn,
}

#[derive(Debug, Clone, Serialize)]
pub struct WarmupFailure {
    pub key: String,
    pub outcome: &'static str,
    pub reason: String,
}

/// Result of one warm-up run.
#[derive(Debug, Clone, Serialize)]
pub struct WarmupReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub refreshed: Vec<String>,
    pub failed: Vec<WarmupFailure>,
}

/// Refreshes a fixed set of targets through a shared context.
pub struct WarmupJob {
    ctx: Arc<AppContext>,
    targets: Vec<WarmupTarget>,
    interval: Duration,
}

impl WarmupJob {
    pub fn new(ctx: Arc<AppContext>, targets: Vec<WarmupTarget>, interval: Duration) -> Self {
        Self {
            ctx,
            targets,
            interval,
        }
    }

    /// Build HTTP-backed targets from `[warmup]` in the context's config.
    pub fn from_config(ctx: Arc<AppContext>, provider: &HttpJsonProvider) -> Self {
        let warmup = &ctx.config().warmup;
        let targets = warmup
            .targets
            .iter()
            .map(|target| WarmupTarget {
                key: RequestKey::new(&target.service, &target.method, &target.params),
                upstream: target.upstream.clone(),
                data_type: target.data_type.clone(),
                fetch: Arc::new(provider.fetcher(target.url.clone(), target.wrap_field.clone())) as FetchFn,
            })
            .collect();
        let interval = Duration::from_secs(warmup.interval_secs.max(1));
        Self::new(ctx, targets, interval)
    }

    pub fn targets(&self) -> &[WarmupTarget] {
        &self.targets
    }

    /// Refresh every target once.
    pub async fn run_once(&self) -> WarmupReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        tracing::info!(%run_id, targets = self.targets.len(), "Warm-up run starting");

        let outcomes = join_all(self.targets.iter().map(|target| self.refresh(target))).await;

        let mut refreshed = Vec::new();
        let mut failed = Vec::new();
        for (target, outcome) in self.targets.iter().zip(outcomes) {
            let key = target.key.to_string();
            match outcome {
                FetchOutcome::Fresh(_) | FetchOutcome::Cached(_) => refreshed.push(key),
                FetchOutcome::Stale { ref reason, .. } | FetchOutcome::Unavailable { ref reason, .. } => {
                    tracing::warn!(%run_id, key = %key, reason = %reason, "Warm-up target failed");
                    failed.push(WarmupFailure {
                        key,
                        outcome: outcome.label(),
                        reason: reason.clone(),
                    });
                }
            }
        }

        let finished_at = Utc::now();
        self.ctx.mark_refreshed(finished_at);
        metrics::record_warmup(start, failed.len());
        tracing::info!(
            %run_id,
            refreshed = refreshed.len(),
            failed = failed.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Warm-up run complete"
        );

        WarmupReport {
            run_id,
            started_at,
            finished_at,
            refreshed,
            failed,
        }
    }

    /// Run until the shutdown broadcast fires. The first run starts at once.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            targets = self.targets.len(),
            "Warm-up job starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Warm-up job received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn refresh(&self, target: &WarmupTarget) -> FetchOutcome {
        let Some(queue) = self.ctx.upstream(&target.upstream) else {
            return FetchOutcome::Unavailable {
                value: self.ctx.validator().profile(&target.data_type).default_value.clone(),
                reason: format!("unknown upstream group: {}", target.upstream),
            };
        };
        let fetch = target.fetch.clone();
        self.ctx
            .orchestrator()
            .refresh(
                target.key.as_str(),
                queue,
                queue.config().timeout(),
                &target.data_type,
                move |token| fetch(token),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::config::{GatewayConfig, UpstreamConfig};
    use crate::error::UpstreamError;
    use futures_util::FutureExt;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn context() -> Arc<AppContext> {
        let mut config = GatewayConfig::default();
        config.upstreams = BTreeMap::from([(
            "defillama".to_string(),
            UpstreamConfig {
                retry_attempts: 0,
                ..UpstreamConfig::default()
            },
        )]);
        Arc::new(AppContext::new(config, Arc::new(MemoryStore::new())))
    }

    fn target(key: &str, fetch: FetchFn) -> WarmupTarget {
        WarmupTarget {
            key: RequestKey::from_raw(key),
            upstream: "defillama".into(),
            data_type: "protocol-tvl".into(),
            fetch,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_reports_per_key_failures() {
        let ctx = context();
        let ok: FetchFn = Arc::new(|_| async { Ok(json!({ "tvl": 2_000_000 })) }.boxed());
        let broken: FetchFn = Arc::new(|_| async { Err(UpstreamError::http(500, "boom")) }.boxed());
        let job = WarmupJob::new(
            ctx.clone(),
            vec![target("defillama:tvl:aave", ok), target("defillama:tvl:curve", broken)],
            Duration::from_secs(60),
        );

        let report = job.run_once().await;

        assert_eq!(report.refreshed, vec!["defillama:tvl:aave".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].key, "defillama:tvl:curve");
        assert_eq!(report.failed[0].outcome, "unavailable");
        assert_eq!(ctx.cache().get("defillama:tvl:aave").await, Some(json!({ "tvl": 2_000_000 })));
        assert_eq!(ctx.last_refresh(), Some(report.finished_at));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_bypasses_live_cache() {
        let ctx = context();
        ctx.cache().set("defillama:tvl:aave", &json!({ "tvl": 1_000_000 }), 600).await;
        let fetch: FetchFn = Arc::new(|_| async { Ok(json!({ "tvl": 1_100_000 })) }.boxed());
        let job = WarmupJob::new(ctx.clone(), vec![target("defillama:tvl:aave", fetch)], Duration::from_secs(60));

        job.run_once().await;

        assert_eq!(ctx.cache().get("defillama:tvl:aave").await, Some(json!({ "tvl": 1_100_000 })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_upstream_is_reported() {
        let ctx = context();
        let fetch: FetchFn = Arc::new(|_| async { Ok(json!({})) }.boxed());
        let mut bad = target("x:y", fetch);
        bad.upstream = "missing".into();
        let report = WarmupJob::new(ctx, vec![bad], Duration::from_secs(60)).run_once().await;
        assert!(report.failed[0].reason.contains("unknown upstream group"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_repeats_until_shutdown() {
        let ctx = context();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let fetch: FetchFn = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(json!({ "tvl": 5_000_000 })) }.boxed()
        });
        let job = WarmupJob::new(ctx.clone(), vec![target("defillama:tvl:aave", fetch)], Duration::from_secs(60));

        let handle = tokio::spawn(job.run(ctx.shutdown().subscribe()));
        tokio::time::sleep(Duration::from_secs(150)).await;
        ctx.shutdown().trigger();
        handle.await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
