//! Back-off between automatic retries after a transient failure.

use serde::{Deserialize, Serialize};

/// Exponential back-off: `base * 2^(attempts - 1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Delay after the first failure (milliseconds)
    pub base_delay_ms: u64,
    /// Upper bound for any delay (milliseconds)
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
        }
    }

    /// Delay before the next automatic attempt, given failed attempts so far.
    pub fn delay_ms(&self, attempts: u32) -> u64 {
        if attempts == 0 {
            return 0;
        }
        let shift = (attempts - 1).min(32);
        self.base_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2_000, 300_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_delay_before_first_failure() {
        assert_eq!(RetryPolicy::default().delay_ms(0), 0);
    }

    #[test]
    fn doubles_per_attempt() {
        let policy = RetryPolicy::new(1_000, 60_000);
        assert_eq!(policy.delay_ms(1), 1_000);
        assert_eq!(policy.delay_ms(2), 2_000);
        assert_eq!(policy.delay_ms(3), 4_000);
    }

    #[test]
    fn capped_at_max() {
        let policy = RetryPolicy::new(1_000, 60_000);
        assert_eq!(policy.delay_ms(10), 60_000);
        assert_eq!(policy.delay_ms(u32::MAX), 60_000);
    }

    #[test]
    fn max_never_below_base() {
        let policy = RetryPolicy::new(5_000, 10);
        assert_eq!(policy.max_delay_ms, 5_000);
        assert_eq!(policy.delay_ms(3), 5_000);
    }
}
