//! Exponential backoff with optional jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before retry `attempt` (1-based): `min(base * 2^(attempt-1), max)`.
///
/// Attempt 0 is the initial call and never waits.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    Duration::from_millis(delay_ms.min(max_ms))
}

/// Add 0 to 10% of `delay` on top of it.
pub fn with_jitter(delay: Duration) -> Duration {
    let delay_ms = delay.as_millis() as u64;
    let jitter_range = delay_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let delays: Vec<u128> = (1..=7)
            .map(|n| calculate_backoff(n, 1000, 30_000).as_millis())
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000, 30000]);
    }

    #[test]
    fn test_initial_attempt_has_no_delay() {
        assert_eq!(calculate_backoff(0, 1000, 30_000), Duration::ZERO);
    }

    #[test]
    fn test_large_attempts_saturate_at_max() {
        assert_eq!(calculate_backoff(200, 1000, 30_000).as_millis(), 30_000);
    }

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        for _ in 0..50 {
            let d = with_jitter(Duration::from_millis(1000)).as_millis();
            assert!((1000..1100).contains(&d));
        }
    }
}
