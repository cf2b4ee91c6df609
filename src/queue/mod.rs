//! Request queue subsystem.
//!
//! # Data Flow
//! ```text
//! key.rs           (service, method, params) → canonical RequestKey
//! request_queue.rs dedup by key → concurrency permit → breaker admission
//!                  → rate_window.rs (sliding 1s window) → attempt → retry
//! ```
//!
//! # Design Decisions
//! - One queue per upstream group, each owning its own circuit breaker
//! - At most one in-flight operation per key; joiners share its result
//! - Admission order across distinct keys is best-effort, not FIFO

pub mod key;
pub mod rate_window;
pub mod request_queue;

pub use key::RequestKey;
pub use request_queue::{QueueStatus, RequestQueue};
