//! Retry backoff policy.

use std::time::Duration;

use rand::Rng;

use crate::config::WorkerConfig;

/// Delay before re-running a task whose attempt `attempt` (1-based) failed
/// with a retryable error.
///
/// `min(base * 2^(attempt-1), max_delay)` plus uniform jitter in
/// `0..=retry_jitter_ms`.
pub fn retry_delay(attempt: u32, config: &WorkerConfig) -> Duration {
    let exp = attempt.saturating_sub(1).min(31);
    let delay_ms = config
        .retry_base_ms
        .saturating_mul(1u64 << exp)
        .min(config.retry_max_delay_ms);

    let jitter_ms = if config.retry_jitter_ms > 0 {
        rand::thread_rng().gen_range(0..=config.retry_jitter_ms)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: u64, max: u64, jitter: u64) -> WorkerConfig {
        WorkerConfig {
            retry_base_ms: base,
            retry_max_delay_ms: max,
            retry_jitter_ms: jitter,
            ..WorkerConfig::default()
        }
    }

    #[test]
    fn test_exponential_schedule_without_jitter() {
        let config = config(1000, 60_000, 0);

        assert_eq!(retry_delay(1, &config), Duration::from_millis(1000));
        assert_eq!(retry_delay(2, &config), Duration::from_millis(2000));
        assert_eq!(retry_delay(3, &config), Duration::from_millis(4000));
        assert_eq!(retry_delay(4, &config), Duration::from_millis(8000));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = config(1000, 5000, 0);
        assert_eq!(retry_delay(10, &config), Duration::from_millis(5000));
        // Shift amounts beyond 31 must not overflow either.
        assert_eq!(retry_delay(64, &config), Duration::from_millis(5000));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let config = config(1000, 60_000, 250);

        for _ in 0..100 {
            let delay = retry_delay(2, &config);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(2250));
        }
    }
}
