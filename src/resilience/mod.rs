//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an upstream:
//!     → circuit_breaker.rs (admission; fail fast while open)
//!     → timeouts.rs (deadline race, cancellation token)
//!     → On failure: retries.rs (transient or permanent?)
//!                   backoff.rs (how long to wait before the next attempt)
//!     → circuit_breaker.rs (record the settled outcome)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream attempt has a deadline
//! - Circuit breaker prevents cascading failures across retries
//! - The request queue composes these pieces; nothing here knows about keys

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{Admission, BreakerSnapshot, CircuitBreaker, CircuitState};
