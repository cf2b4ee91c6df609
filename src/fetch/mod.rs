//! Fetch orchestration.
//!
//! # Data Flow
//! ```text
//! caller
//!     → orchestrator.rs safe_fetch(key, upstream, timeout, data_type, fetch)
//!         → cache (live) ── hit ──▶ Cached
//!         → queue.enqueue(key, deadline-raced fetch)
//!         → validator (against stale shadow)
//!         → cache (live + stale) ──▶ Fresh
//!         → on failure: stale shadow ──▶ Stale, else default ──▶ Unavailable
//! ```

pub mod orchestrator;
pub mod outcome;

pub use orchestrator::FetchOrchestrator;
pub use outcome::FetchOutcome;
