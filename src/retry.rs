//! Backoff and wait-budget computation for the acquisition loop.
//!
//! The timing math lives in pure functions with explicit inputs so the
//! exact delay sequence can be unit tested; the single impure entry point
//! ([`compute_delay`]) only samples the jitter before delegating.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Compute the backoff delay before retry `attempt_index`, in milliseconds.
///
/// `attempt_index` starts at 0, which is the delay before the *second*
/// attempt. The exponential curve is clamped to `max_delay_ms` before
/// jitter is applied, so jitter can push an individual delay slightly past
/// the clamp.
///
/// `unit_jitter` is the sampled jitter position in `[-1, 1]`; it is scaled
/// by the configured `jitter_factor`. Passing 0 yields the deterministic
/// delay.
pub fn backoff_delay_ms(config: &RetryConfig, attempt_index: u32, unit_jitter: f64) -> u64 {
    let exponential = config.base_delay_ms as f64 * config.backoff_multiplier.powi(attempt_index as i32);
    let clamped = exponential.clamp(0.0, config.max_delay_ms as f64);
    let jittered = clamped * (1.0 + unit_jitter.clamp(-1.0, 1.0) * config.jitter_factor);
    jittered.max(0.0).round() as u64
}

/// Sample the delay before retry `attempt_index`, with uniform symmetric
/// jitter.
pub fn compute_delay(config: &RetryConfig, attempt_index: u32) -> Duration {
    // Sample outside the pure path; rng is not held across awaits.
    let unit_jitter = if config.jitter_factor > 0.0 {
        rand::rng().random_range(-1.0..=1.0)
    } else {
        0.0
    };
    Duration::from_millis(backoff_delay_ms(config, attempt_index, unit_jitter))
}

/// Whether the cumulative wait-time budget still permits another sleep.
pub fn budget_remaining(config: &RetryConfig, total_waited: Duration) -> bool {
    total_waited < Duration::from_millis(config.max_total_wait_time_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deterministic_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
            max_total_wait_time_ms: 30_000,
        }
    }

    #[test]
    fn zero_jitter_sequence_is_deterministic() {
        let config = deterministic_config();
        assert_eq!(backoff_delay_ms(&config, 0, 0.0), 100);
        assert_eq!(backoff_delay_ms(&config, 1, 0.0), 200);
        assert_eq!(backoff_delay_ms(&config, 2, 0.0), 400);
        assert_eq!(backoff_delay_ms(&config, 3, 0.0), 800);
    }

    #[test]
    fn delay_clamps_to_max() {
        let config = RetryConfig {
            max_delay_ms: 500,
            ..deterministic_config()
        };
        assert_eq!(backoff_delay_ms(&config, 10, 0.0), 500);
    }

    #[test]
    fn jitter_perturbs_within_symmetric_bounds() {
        let config = RetryConfig {
            jitter_factor: 0.1,
            ..deterministic_config()
        };
        assert_eq!(backoff_delay_ms(&config, 0, 1.0), 110);
        assert_eq!(backoff_delay_ms(&config, 0, -1.0), 90);

        for _ in 0..100 {
            let delay = compute_delay(&config, 0).as_millis() as u64;
            assert!((90..=110).contains(&delay), "delay {delay} outside jitter bounds");
        }
    }

    #[test]
    fn sampled_delay_is_exact_when_jitter_disabled() {
        let config = deterministic_config();
        assert_eq!(compute_delay(&config, 2), Duration::from_millis(400));
    }

    #[test]
    fn budget_exhausts_at_ceiling() {
        let config = RetryConfig {
            max_total_wait_time_ms: 1_000,
            ..deterministic_config()
        };
        assert!(budget_remaining(&config, Duration::from_millis(999)));
        assert!(!budget_remaining(&config, Duration::from_millis(1_000)));
        assert!(!budget_remaining(&config, Duration::from_millis(2_000)));
    }
}
