//! Retry budget and back-off schedule

use std::time::Duration;

use fabricflow_domain::config::RetryConfig;
use fabricflow_domain::constants::{
    DEFAULT_BASE_BACKOFF_MS, DEFAULT_MAX_BACKOFF_SECS, DEFAULT_MAX_RETRIES,
    DEFAULT_RATE_LIMIT_CAP_SECS,
};

/// Limits applied by the dispatcher to a single logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Total time one request may spend sleeping between attempts,
    /// including server-requested `Retry-After` waits.
    pub rate_limit_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: Duration::from_millis(DEFAULT_BASE_BACKOFF_MS),
            max_backoff: Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS),
            rate_limit_cap: Duration::from_secs(DEFAULT_RATE_LIMIT_CAP_SECS),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            rate_limit_cap: Duration::from_secs(config.rate_limit_cap_secs),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn no_retries() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Exponential back-off before retry number `retry` (zero-based):
    /// `base * 2^retry`, capped at `max_backoff`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        // 2^20 already exceeds any sane cap; avoids overflow for large counts
        let factor = 2u32.saturating_pow(retry.min(20));
        self.base_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Decide how long to sleep given what has already been slept.
    ///
    /// A back-off that does not fit is shortened to the remaining cap. A
    /// server-mandated wait (`mandatory`) that does not fit cannot be
    /// honoured, so `None` is returned and the caller gives up.
    pub fn plan_delay(
        &self,
        requested: Duration,
        mandatory: bool,
        waited: Duration,
    ) -> Option<Duration> {
        let remaining = self.rate_limit_cap.saturating_sub(waited);
        if requested <= remaining {
            Some(requested)
        } else if mandatory || remaining.is_zero() {
            None
        } else {
            Some(remaining)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(8));
        assert_eq!(policy.backoff_delay(6), Duration::from_secs(60));
        assert_eq!(policy.backoff_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn plan_delay_respects_total_cap() {
        let policy =
            RetryPolicy { rate_limit_cap: Duration::from_secs(10), ..RetryPolicy::default() };

        assert_eq!(
            policy.plan_delay(Duration::from_secs(4), true, Duration::from_secs(5)),
            Some(Duration::from_secs(4))
        );
        // back-off is clipped to what is left
        assert_eq!(
            policy.plan_delay(Duration::from_secs(8), false, Duration::from_secs(5)),
            Some(Duration::from_secs(5))
        );
        // a Retry-After beyond the cap cannot be honoured
        assert_eq!(policy.plan_delay(Duration::from_secs(8), true, Duration::from_secs(5)), None);
        assert_eq!(policy.plan_delay(Duration::from_secs(1), false, Duration::from_secs(10)), None);
    }

    #[test]
    fn built_from_config() {
        let config = RetryConfig {
            max_retries: 2,
            base_backoff_ms: 250,
            max_backoff_secs: 4,
            rate_limit_cap_secs: 30,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(250));
        assert_eq!(policy.backoff_delay(5), Duration::from_secs(4));
        assert_eq!(policy.rate_limit_cap, Duration::from_secs(30));
    }
}
