//! Timeout enforcement with real cancellation.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the losing future is dropped, not
//!   left running in the background
//! - The fetch also receives a `CancellationToken` so work it spawned
//!   elsewhere (sockets, subtasks) can observe the deadline
//! - The token is cancelled on timeout and whenever the caller stops waiting
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{UpstreamError, UpstreamResult};

/// Race `f(token)` against `deadline`.
pub async fn with_deadline<T, F, Fut>(deadline: Duration, f: F) -> UpstreamResult<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = UpstreamResult<T>>,
{
    let token = CancellationToken::new();
    // Cancels the token if this future is dropped mid-flight.
    let guard = token.clone().drop_guard();

    match tokio::time::timeout(deadline, f(token)).await {
        Ok(result) => {
            let _ = guard.disarm();
            result
        }
        Err(_) => {
            drop(guard);
            Err(UpstreamError::Timeout(deadline))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_token() {
        let seen: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));
        let slot = seen.clone();

        let result: UpstreamResult<u32> = with_deadline(Duration::from_millis(100), |token| {
            *slot.lock().unwrap() = Some(token.clone());
            async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(1)
            }
        })
        .await;

        assert_eq!(result, Err(UpstreamError::Timeout(Duration::from_millis(100))));
        let token = seen.lock().unwrap().take().unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_fetch_wins() {
        let seen: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));
        let slot = seen.clone();

        let result = with_deadline(Duration::from_secs(1), |token| {
            *slot.lock().unwrap() = Some(token.clone());
            async { Ok::<_, UpstreamError>("done") }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert!(!seen.lock().unwrap().take().unwrap().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_passes_through() {
        let result: UpstreamResult<()> = with_deadline(Duration::from_secs(1), |_| async {
            Err(UpstreamError::http(502, "bad gateway"))
        })
        .await;
        assert_eq!(result, Err(UpstreamError::http(502, "bad gateway")));
    }
}
