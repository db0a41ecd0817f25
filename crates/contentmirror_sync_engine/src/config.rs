//! Configuration for the sync engine.

use crate::error::SyncError;
use std::time::Duration;

/// Default id of the record holding the persisted cursor.
pub const DEFAULT_CURSOR_KEY: &str = "sync_token";

/// Configuration for sync calls.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Id of the record the cursor is persisted under.
    pub cursor_key: String,
    /// Upper bound on delta pages fetched by one `next` call. `None` drains the stream.
    pub max_pages_per_call: Option<usize>,
    /// Rescheduling policy for callers.
    pub retry: RetryPolicy,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            cursor_key: DEFAULT_CURSOR_KEY.to_string(),
            max_pages_per_call: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the cursor record id.
    #[must_use]
    pub fn with_cursor_key(mut self, key: impl Into<String>) -> Self {
        self.cursor_key = key.into();
        self
    }

    /// Caps the pages fetched per call.
    #[must_use]
    pub fn with_max_pages_per_call(mut self, pages: usize) -> Self {
        self.max_pages_per_call = Some(pages.max(1));
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponential backoff for rescheduling a failed or incomplete `next`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Multiplier applied per retry.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` attempts.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }

    /// Creates a policy with a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay before attempt `attempt` (0-indexed). The first attempt has none.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if secs.is_nan() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(secs.clamp(0.0, self.max_delay.as_secs_f64()))
    }

    /// Whether a call that failed on attempt `attempt` (0-indexed) should be rescheduled.
    pub fn should_retry(&self, attempt: u32, error: &SyncError) -> bool {
        attempt + 1 < self.max_attempts && error.is_retryable()
    }

    /// Whether another attempt is left after `attempt`.
    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentmirror_protocol::SourceError;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_cursor_key("cursor")
            .with_max_pages_per_call(0)
            .with_retry(RetryPolicy::no_retry());
        assert_eq!(config.cursor_key, "cursor");
        assert_eq!(config.max_pages_per_call, Some(1));
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(SyncConfig::default().cursor_key, DEFAULT_CURSOR_KEY);
    }

    #[test]
    fn retry_delay_calculation() {
        let policy = RetryPolicy::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn retry_delay_respects_max() {
        let policy = RetryPolicy::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0);
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn odd_multipliers_stay_in_range() {
        let negative = RetryPolicy::new(5).with_backoff_multiplier(-2.0);
        assert_eq!(negative.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(negative.delay_for_attempt(2), Duration::ZERO);

        let nan = RetryPolicy::new(5).with_backoff_multiplier(f64::NAN);
        assert_eq!(nan.delay_for_attempt(3), Duration::ZERO);

        let infinite = RetryPolicy::new(5).with_backoff_multiplier(f64::INFINITY);
        assert_eq!(infinite.delay_for_attempt(3), Duration::from_secs(60));
    }

    #[test]
    fn should_retry_checks_error_and_budget() {
        let policy = RetryPolicy::new(3);
        let retryable = SyncError::from(SourceError::transport_retryable("timeout"));
        let fatal = SyncError::InvalidCursor("gone".into());
        assert!(policy.should_retry(0, &retryable));
        assert!(policy.should_retry(1, &retryable));
        assert!(!policy.should_retry(2, &retryable));
        assert!(!policy.should_retry(0, &fatal));
        assert!(!RetryPolicy::no_retry().should_retry(0, &retryable));
    }
}
