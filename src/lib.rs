//! Resilient upstream data gateway.
//!
//! A single access layer in front of rate-limited, unreliable third-party
//! data providers: request deduplication, per-upstream rate limiting and
//! concurrency bounds, retries with backoff, circuit breaking, plausibility
//! validation and a stale-value fallback cache.
//!
//! # Architecture Overview
//!
//! ```text
//!     caller
//!       │
//!       ▼
//!  ┌──────────────────┐  hit   ┌──────────────────────────────┐
//!  │ FetchOrchestrator├───────▶│ TieredCache (live + :stale)  │
//!  └────────┬─────────┘        └──────────────▲───────────────┘
//!           │ miss                            │ write (valid)
//!           ▼                                 │
//!  ┌──────────────────┐        ┌──────────────┴───────────────┐
//!  │ RequestQueue     │        │ DataValidator                │
//!  │ dedup / permits /│        │ rule registry, swing guard,  │
//!  │ rate window /    │        │ stale merge                  │
//!  │ retry + breaker  │        └──────────────▲───────────────┘
//!  └────────┬─────────┘                       │
//!           ▼                                 │
//!     provider fetch (deadline + cancellation)┘
//! ```
//!
//! Cross-cutting: `config` (TOML), `observability` (tracing, Prometheus),
//! `lifecycle` (signals, shutdown), `admin` (axum), `warmup` (scheduler).

// Core pipeline
pub mod cache;
pub mod data_type;
pub mod fetch;
pub mod queue;
pub mod resilience;
pub mod validation;

// Providers and background work
pub mod providers;
pub mod warmup;

// Process wiring
pub mod admin;
pub mod config;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use context::AppContext;
pub use error::{UpstreamError, UpstreamResult};
pub use fetch::FetchOutcome;
pub use lifecycle::Shutdown;
