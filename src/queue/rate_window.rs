//! Sliding-window rate limiter.
//!
//! Holds the start times of recent calls. Before each admission the window
//! is pruned to the trailing second; a full window parks the caller until the
//! oldest entry ages out. Unlike a token bucket there is no burst credit: no
//! more than `limit` calls start in any rolling window.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub struct SlidingWindow {
    limit: usize,
    window: Duration,
    stamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindow {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1) as usize,
            window,
            stamps: Mutex::new(VecDeque::new()),
        }
    }

    /// One-second window, the usual `requests_per_second` shape.
    pub fn per_second(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(1))
    }

    /// Wait for a slot, then record the call.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut stamps = self.lock();
                let now = Instant::now();
                self.prune(&mut stamps, now);

                if stamps.len() < self.limit {
                    stamps.push_back(now);
                    return;
                }
                match stamps.front() {
                    Some(oldest) => (*oldest + self.window).saturating_duration_since(now),
                    None => Duration::ZERO,
                }
            };

            tracing::trace!(wait_ms = wait.as_millis() as u64, "Rate window full, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of calls started within the current window.
    pub fn recent_count(&self) -> usize {
        let mut stamps = self.lock();
        self.prune(&mut stamps, Instant::now());
        stamps.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn prune(&self, stamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = stamps.front() {
            if now.duration_since(*oldest) >= self.window {
                stamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Instant>> {
        self.stamps.lock().expect("rate window mutex poisoned")
    }
}
