//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_signal() resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger() → warm-up loop exits → admin server drains → queues close
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop background work, drain the admin listener, then
//!   reject new upstream work
//! - A second signal is not special-cased; the runtime exits when main returns

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
