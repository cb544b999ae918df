//! Reconnection backoff policy.

use std::time::Duration;

/// Maximum reconnect attempts per abnormal close.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Delay before the first reconnect attempt.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound for any single delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Capped exponential backoff.
///
/// Attempt `i` (0-indexed) waits `min(initial * 2^i, max)`. Computed with
/// integer `Duration` arithmetic; overflow saturates to `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial: DEFAULT_INITIAL_BACKOFF,
            max: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait before attempt `attempt` (0-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        1u32.checked_shl(attempt)
            .and_then(|factor| self.initial.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Sum of every delay in one full retry sequence.
    #[must_use]
    pub fn total_delay(&self) -> Duration {
        (0..self.max_attempts)
            .map(|attempt| self.delay_for(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_schedule() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u64> = (0..policy.max_attempts)
            .map(|attempt| policy.delay_for(attempt).as_secs())
            .collect();

        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
        assert_eq!(policy.total_delay(), Duration::from_secs(31));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for(31), Duration::from_secs(30));
        assert_eq!(policy.delay_for(64), Duration::from_secs(30));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
    }

    proptest! {
        #[test]
        fn prop_delays_non_decreasing_and_capped(
            initial_ms in 1u64..5_000,
            max_ms in 1u64..120_000,
            attempt in 0u32..80,
        ) {
            let policy = BackoffPolicy {
                max_attempts: 5,
                initial: Duration::from_millis(initial_ms),
                max: Duration::from_millis(max_ms),
            };

            let current = policy.delay_for(attempt);
            let next = policy.delay_for(attempt + 1);
            prop_assert!(current <= next);
            prop_assert!(next <= policy.max);
        }
    }
}
