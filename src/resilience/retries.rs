//! Retry classification.
//!
//! # Design Decisions
//! - Network errors, timeouts, 5xx and 429 are transient and retried
//! - Any other 4xx is permanent: retrying cannot change the answer
//! - Errors raised by the resilience layer itself (circuit open, queue full,
//!   closed, cancelled) are never retried

use crate::error::UpstreamError;

/// Returns true if the error is worth another attempt.
pub fn is_retryable(error: &UpstreamError) -> bool {
    match error {
        UpstreamError::Http { status, .. } => *status == 429 || !(400..500).contains(status),
        UpstreamError::Network(_) | UpstreamError::Timeout(_) | UpstreamError::Internal(_) => true,
        UpstreamError::CircuitOpen { .. }
        | UpstreamError::QueueFull { .. }
        | UpstreamError::QueueClosed
        | UpstreamError::Cancelled => false,
    }
}
