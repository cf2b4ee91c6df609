//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so a minimal (or empty) file works.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Root configuration for the data gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Administrative HTTP surface (health, cache flush, last refresh).
    pub admin: AdminConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Tiered cache settings.
    pub cache: CacheConfig,

    /// Plausibility thresholds for fetched data.
    pub validation: ValidationConfig,

    /// Upstream groups, each with its own queue and circuit breaker.
    ///
    /// Declaring any group replaces the built-in set entirely.
    pub upstreams: BTreeMap<String, UpstreamConfig>,

    /// Scheduled warm-up of hot keys.
    pub warmup: WarmupConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            admin: AdminConfig::default(),
            observability: ObservabilityConfig::default(),
            cache: CacheConfig::default(),
            validation: ValidationConfig::default(),
            upstreams: default_upstreams(),
            warmup: WarmupConfig::default(),
        }
    }
}

/// Per-upstream queue, retry and breaker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Maximum operations executing at once.
    pub concurrency: usize,

    /// Maximum attempts started in any rolling second.
    pub requests_per_second: u32,

    /// Retries after the first attempt.
    pub retry_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Add up to 10% random jitter to each backoff delay.
    pub jitter: bool,

    /// Maximum distinct keys in flight before new keys are rejected.
    pub max_pending: usize,

    /// Consecutive failures before the circuit opens.
    pub breaker_threshold: u32,

    /// Cooldown before a probe is allowed, in milliseconds.
    pub breaker_timeout_ms: u64,

    /// Deadline for a single upstream attempt, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            requests_per_second: 5,
            retry_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: false,
            max_pending: 100,
            breaker_threshold: 5,
            breaker_timeout_ms: 60_000,
            timeout_ms: 10_000,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn breaker_timeout(&self) -> Duration {
        Duration::from_millis(self.breaker_timeout_ms)
    }
}

fn default_upstreams() -> BTreeMap<String, UpstreamConfig> {
    let mut upstreams = BTreeMap::new();
    upstreams.insert(
        "coingecko".to_string(),
        UpstreamConfig {
            concurrency: 1,
            requests_per_second: 1,
            ..UpstreamConfig::default()
        },
    );
    upstreams.insert(
        "defillama".to_string(),
        UpstreamConfig {
            concurrency: 5,
            requests_per_second: 10,
            ..UpstreamConfig::default()
        },
    );
    upstreams.insert("thegraph".to_string(), UpstreamConfig::default());
    upstreams.insert("curve".to_string(), UpstreamConfig::default());
    upstreams.insert(
        "ethereum-rpc".to_string(),
        UpstreamConfig {
            concurrency: 5,
            requests_per_second: 10,
            breaker_threshold: 3,
            breaker_timeout_ms: 30_000,
            timeout_ms: 5_000,
            ..UpstreamConfig::default()
        },
    );
    upstreams
}

/// Tiered cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Stale shadow TTL as a multiple of the live TTL.
    pub stale_multiplier: u64,

    /// Live TTL overrides in seconds, keyed by data type tag.
    pub ttl_overrides: BTreeMap<String, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_multiplier: 4,
            ttl_overrides: BTreeMap::new(),
        }
    }
}

/// Plausibility thresholds applied by the data validator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Largest accepted decrease versus the previous value, in percent.
    pub max_drop_pct: f64,

    /// Largest accepted increase versus the previous value, in percent.
    pub max_increase_pct: f64,

    /// Smallest plausible non-zero market cap (USD).
    pub min_market_cap: f64,

    /// Smallest plausible non-zero price (USD).
    pub min_price: f64,

    /// Previous TVL above which a new TVL of exactly zero is rejected.
    pub tvl_materiality_floor: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_drop_pct: 95.0,
            max_increase_pct: 1000.0,
            min_market_cap: 1_000.0,
            min_price: 1e-9,
            tvl_materiality_floor: 100_000.0,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Scheduled warm-up configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WarmupConfig {
    /// Run the warm-up job.
    pub enabled: bool,

    /// Seconds between runs.
    pub interval_secs: u64,

    /// Hot keys to refresh on every run.
    pub targets: Vec<WarmupTargetConfig>,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 300,
            targets: Vec::new(),
        }
    }
}

/// A hot key fetched over plain HTTP GET during warm-up.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WarmupTargetConfig {
    /// Upstream group whose queue and breaker guard the call.
    pub upstream: String,

    /// Service and method that, with `params`, form the request key.
    pub service: String,
    pub method: String,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,

    /// Data type tag (TTL, validation rule, default value).
    #[serde(default = "default_data_type")]
    pub data_type: String,

    /// URL returning JSON.
    pub url: String,

    /// Wrap a bare scalar response as `{ wrap_field: value }`.
    #[serde(default)]
    pub wrap_field: Option<String>,
}

fn default_data_type() -> String {
    "default".to_string()
}
