//! Scheduled warm-up of hot keys.
//!
//! # Data Flow
//! ```text
//! config [[warmup.targets]]
//!     → WarmupTarget (request key + upstream group + fetch function)
//!     → scheduler.rs: every interval_secs
//!         → orchestrator.refresh() per target, concurrently
//!         → WarmupReport { refreshed, failed }
//!         → AppContext::mark_refreshed()
//! ```
//!
//! # Design Decisions
//! - A failing key is recorded in the report, never fatal to the run
//! - The first run starts immediately so caches are warm right after boot

pub mod scheduler;

pub use scheduler::{FetchFn, WarmupFailure, WarmupJob, WarmupReport, WarmupTarget};
