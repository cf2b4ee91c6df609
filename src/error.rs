//! Upstream error taxonomy.
//!
//! Every failure that can come back from an upstream call, or from the
//! machinery wrapped around it, is expressed as an [`UpstreamError`]. The type
//! is `Clone` because a single in-flight result is handed to every
//! deduplicated caller.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by upstream calls and the resilience layer around them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// The provider answered with a non-success HTTP status.
    #[error("upstream returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection, DNS or protocol failure before a status was received.
    #[error("network error: {0}")]
    Network(String),

    /// The attempt did not settle before its deadline.
    #[error("upstream timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The group's circuit breaker rejected the call.
    #[error("circuit open for upstream '{group}'")]
    CircuitOpen { group: String },

    /// Too many distinct keys already in flight for this group.
    #[error("queue for upstream '{group}' is full ({capacity} pending)")]
    QueueFull { group: String, capacity: usize },

    /// The queue was shut down.
    #[error("queue closed")]
    QueueClosed,

    /// The fetch observed its cancellation token.
    #[error("request cancelled")]
    Cancelled,

    /// Anything else (task panics, malformed payloads).
    #[error("internal error: {0}")]
    Internal(String),
}

impl UpstreamError {
    /// Shorthand for an HTTP-class failure.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http { status, .. } if *status == 429 => "rate_limited",
            Self::Http { status, .. } if *status >= 500 => "http_5xx",
            Self::Http { .. } => "http_4xx",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::QueueFull { .. } => "queue_full",
            Self::QueueClosed => "queue_closed",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UpstreamError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "upstream timed out after 1500ms");

        let err = UpstreamError::CircuitOpen {
            group: "coingecko".into(),
        };
        assert!(err.to_string().contains("coingecko"));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(UpstreamError::http(429, "slow down").kind(), "rate_limited");
        assert_eq!(UpstreamError::http(503, "down").kind(), "http_5xx");
        assert_eq!(UpstreamError::http(404, "missing").kind(), "http_4xx");
    }
}
