//! Process-scoped application context.
//!
//! # Responsibilities
//! - Build every long-lived instance from a validated [`GatewayConfig`]:
//!   one request queue (with its breaker) per upstream group, the tiered
//!   cache, the validator and the orchestrator
//! - Answer health and last-refresh questions for the admin surface
//! - Own the shutdown broadcast
//!
//! # Design Decisions
//! - Constructed explicitly and passed around as `Arc<AppContext>`; there
//!   are no process globals, so tests build as many contexts as they need
//! - Upstream groups are fixed for the lifetime of the context

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cache::{KvStore, TieredCache, TtlTable};
use crate::config::GatewayConfig;
use crate::error::UpstreamResult;
use crate::fetch::{FetchOrchestrator, FetchOutcome};
use crate::lifecycle::Shutdown;
use crate::queue::{QueueStatus, RequestQueue};
use crate::resilience::{BreakerSnapshot, CircuitState};
use crate::validation::DataValidator;

/// Health of one upstream group.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamHealth {
    pub queue: QueueStatus,
    pub breaker: BreakerSnapshot,
}

/// Aggregate health: `degraded` as soon as any breaker is not closed.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub upstreams: BTreeMap<String, UpstreamHealth>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Everything a running gateway shares.
pub struct AppContext {
    config: GatewayConfig,
    orchestrator: FetchOrchestrator,
    upstreams: BTreeMap<String, RequestQueue>,
    last_refresh: ArcSwapOption<DateTime<Utc>>,
    shutdown: Shutdown,
    started_at: DateTime<Utc>,
}

impl AppContext {
    pub fn new(config: GatewayConfig, store: Arc<dyn KvStore>) -> Self {
        let cache = TieredCache::new(
            store,
            TtlTable::from_config(&config.cache),
            config.cache.stale_multiplier,
        );
        let validator = DataValidator::from_config(&config.validation);

        let upstreams = config
            .upstreams
            .iter()
            .map(|(name, upstream)| (name.clone(), RequestQueue::new(name.clone(), upstream.clone())))
            .collect::<BTreeMap<_, _>>();

        tracing::info!(
            upstreams = ?upstreams.keys().collect::<Vec<_>>(),
            stale_multiplier = config.cache.stale_multiplier,
            "Application context initialized"
        );

        Self {
            orchestrator: FetchOrchestrator::new(cache, validator),
            upstreams,
            last_refresh: ArcSwapOption::empty(),
            shutdown: Shutdown::new(),
            started_at: Utc::now(),
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &FetchOrchestrator {
        &self.orchestrator
    }

    pub fn cache(&self) -> &TieredCache {
        self.orchestrator.cache()
    }

    pub fn validator(&self) -> &DataValidator {
        self.orchestrator.validator()
    }

    pub fn upstream(&self, name: &str) -> Option<&RequestQueue> {
        self.upstreams.get(name)
    }

    pub fn upstreams(&self) -> impl Iterator<Item = (&String, &RequestQueue)> {
        self.upstreams.iter()
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Safe fetch through the named upstream group with its configured timeout.
    /// An unknown group yields the data type's default.
    pub async fn safe_fetch<F, Fut>(
        &self,
        upstream: &str,
        key: &str,
        data_type: &str,
        fetch: F,
    ) -> FetchOutcome
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = UpstreamResult<Value>> + Send + 'static,
    {
        let Some(queue) = self.upstreams.get(upstream) else {
            tracing::error!(upstream, key, "Unknown upstream group");
            return FetchOutcome::Unavailable {
                value: self.validator().profile(data_type).default_value.clone(),
                reason: format!("unknown upstream group: {upstream}"),
            };
        };
        let timeout = queue.config().timeout();
        self.orchestrator
            .safe_fetch(key, queue, timeout, data_type, fetch)
            .await
    }

    pub fn health(&self) -> HealthReport {
        let upstreams = self
            .upstreams
            .iter()
            .map(|(name, queue)| {
                let health = UpstreamHealth {
                    queue: queue.status(),
                    breaker: queue.breaker().snapshot(),
                };
                (name.clone(), health)
            })
            .collect::<BTreeMap<_, _>>();

        let degraded = upstreams
            .values()
            .any(|u| u.breaker.state != CircuitState::Closed);

        HealthReport {
            status: if degraded { "degraded" } else { "healthy" },
            upstreams,
        }
    }

    pub fn mark_refreshed(&self, at: DateTime<Utc>) {
        self.last_refresh.store(Some(Arc::new(at)));
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh.load_full().map(|at| *at)
    }

    /// Reject new upstream work on every group.
    pub fn close_upstreams(&self) {
        for queue in self.upstreams.values() {
            queue.close();
        }
    }
}
