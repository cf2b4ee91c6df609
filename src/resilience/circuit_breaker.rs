//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed down, calls fail fast
//! - Half-Open: a single probe call tests whether the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold
//! Open → Half-Open: first call after the cooldown elapsed
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails (failure_count is still >= threshold)
//! ```
//!
//! # Design Decisions
//! - One breaker per upstream group (never global)
//! - Fail fast in Open state (no waiting for the cooldown)
//! - Single probe in Half-Open (prevents hammering a recovering upstream)

use serde::Serialize;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{UpstreamError, UpstreamResult};
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn gauge_value(self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::HalfOpen => 1,
            CircuitState::Open => 2,
        }
    }
}

/// Point-in-time view of a breaker, for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub threshold: u32,
    pub timeout_ms: u64,
    /// Milliseconds since the last recorded failure, if any.
    pub last_failure_ms_ago: Option<u64>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
}

/// Per-upstream circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    threshold: u32,
    timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker that opens after `threshold` failures and
    /// allows a probe `timeout` after the last failure.
    pub fn new(name: impl Into<String>, threshold: u32, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            threshold: threshold.max(1),
            timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Ask permission to call the upstream.
    ///
    /// Every `Ok` must be followed by exactly one `record_success` or
    /// `record_failure`.
    pub fn try_acquire(&self) -> UpstreamResult<()> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .map_or(true, |at| at.elapsed() >= self.timeout);
                if !cooled_down {
                    return Err(self.open_error());
                }
                inner.state = CircuitState::HalfOpen;
                inner.probe_in_flight = true;
                drop(inner);
                self.on_transition(CircuitState::HalfOpen);
                Ok(())
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(self.open_error())
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        inner.probe_in_flight = false;
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            drop(inner);
            self.on_transition(CircuitState::Closed);
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        inner.probe_in_flight = false;

        if inner.failure_count >= self.threshold && inner.state != CircuitState::Open {
            inner.state = CircuitState::Open;
            let failures = inner.failure_count;
            drop(inner);
            tracing::warn!(
                upstream = %self.name,
                failures,
                cooldown_ms = self.timeout.as_millis() as u64,
                "Circuit opened"
            );
            self.on_transition(CircuitState::Open);
        }
    }

    /// [`try_acquire`](Self::try_acquire) wrapped in an [`Admission`] that
    /// records a failure if dropped before it is settled.
    pub fn admit(&self) -> UpstreamResult<Admission<'_>> {
        self.try_acquire()?;
        Ok(Admission {
            breaker: self,
            settled: false,
        })
    }

    /// Run `op` under the breaker.
    pub async fn call<T, F, Fut>(&self, op: F) -> UpstreamResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = UpstreamResult<T>>,
    {
        let admission = self.admit()?;
        match op().await {
            Ok(value) => {
                admission.succeed();
                Ok(value)
            }
            Err(e) => {
                admission.fail();
                Err(e)
            }
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            threshold: self.threshold,
            timeout_ms: self.timeout.as_millis() as u64,
            last_failure_ms_ago: inner.last_failure.map(|at| at.elapsed().as_millis() as u64),
        }
    }

    fn open_error(&self) -> UpstreamError {
        UpstreamError::CircuitOpen {
            group: self.name.clone(),
        }
    }

    fn on_transition(&self, state: CircuitState) {
        tracing::info!(upstream = %self.name, state = ?state, "Circuit state changed");
        metrics::record_circuit_state(&self.name, state.gauge_value());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }
}

/// An admitted call that must report its outcome. Dropping it unsettled, as
/// when the operation panics or is cancelled, counts as a failure so a
/// half-open trial slot is never held forever.
#[must_use = "an unsettled admission records a failure when dropped"]
pub struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl Admission<'_> {
    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(upstream = %self.breaker.name, "Upstream call ended without an outcome");
            self.breaker.record_failure();
        }
    }
}
