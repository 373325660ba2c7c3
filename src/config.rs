//! Configuration for the lock coordinator.

use serde::Deserialize;
use serde::Serialize;

use crate::error::InvalidConfigSnafu;
use crate::error::LockError;

/// Retry behavior for lock acquisition.
///
/// The acquisition loop is bounded by two independent budgets: a retry
/// count and a cumulative wait-time ceiling. Whichever is exhausted first
/// terminates the loop, so a small `max_total_wait_time_ms` bounds tail
/// latency even with a very large `max_attempts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt. Zero still permits the
    /// first attempt; any failure then surfaces immediately.
    pub max_attempts: u32,
    /// Initial backoff delay in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single backoff delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Exponential growth factor between attempts.
    pub backoff_multiplier: f64,
    /// Symmetric jitter applied to each delay, as a fraction in `[0, 1]`.
    /// Zero yields fully deterministic timing.
    pub jitter_factor: f64,
    /// Cumulative wait-time budget across all attempts, in milliseconds.
    pub max_total_wait_time_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            backoff_multiplier: 1.5,
            jitter_factor: 0.1,
            max_total_wait_time_ms: 30_000,
        }
    }
}

/// Configuration for [`RunLocker`](crate::RunLocker).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockerConfig {
    /// Lease TTL per grant, in milliseconds.
    pub duration_ms: u64,
    /// How long before lease expiry the automatic refresh fires, in
    /// milliseconds. Must be strictly less than `duration_ms`.
    pub automatic_extension_threshold_ms: u64,
    /// Retry behavior during acquisition.
    pub retry: RetryConfig,
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            duration_ms: 5_000,
            automatic_extension_threshold_ms: 500,
            retry: RetryConfig::default(),
        }
    }
}

impl LockerConfig {
    /// Validate the configuration at coordinator construction time.
    pub(crate) fn validate(&self) -> Result<(), LockError> {
        if self.duration_ms == 0 {
            return InvalidConfigSnafu {
                reason: "duration_ms must be positive",
            }
            .fail();
        }
        if self.automatic_extension_threshold_ms >= self.duration_ms {
            return InvalidConfigSnafu {
                reason: format!(
                    "automatic_extension_threshold_ms ({}) must be less than duration_ms ({})",
                    self.automatic_extension_threshold_ms, self.duration_ms
                ),
            }
            .fail();
        }
        if self.retry.backoff_multiplier < 1.0 {
            return InvalidConfigSnafu {
                reason: "backoff_multiplier must be at least 1.0",
            }
            .fail();
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return InvalidConfigSnafu {
                reason: "jitter_factor must be within [0.0, 1.0]",
            }
            .fail();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        LockerConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_duration_rejected() {
        let config = LockerConfig {
            duration_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LockError::InvalidConfig { .. })));
    }

    #[test]
    fn threshold_at_or_above_duration_rejected() {
        let config = LockerConfig {
            duration_ms: 500,
            automatic_extension_threshold_ms: 500,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LockError::InvalidConfig { .. })));

        let config = LockerConfig {
            duration_ms: 500,
            automatic_extension_threshold_ms: 800,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LockError::InvalidConfig { .. })));
    }

    #[test]
    fn shrinking_multiplier_rejected() {
        let config = LockerConfig {
            retry: RetryConfig {
                backoff_multiplier: 0.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LockError::InvalidConfig { .. })));
    }

    #[test]
    fn out_of_range_jitter_rejected() {
        let config = LockerConfig {
            retry: RetryConfig {
                jitter_factor: 1.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LockError::InvalidConfig { .. })));
    }
}
