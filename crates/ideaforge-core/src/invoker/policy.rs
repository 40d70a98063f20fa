//! Retry policy for remote generation calls.

use std::time::Duration;

use ideaforge_types::config::RetrySettings;

/// Bounded, fixed-delay retry policy.
///
/// There is no exponential backoff: every pause between attempts is `delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of transport calls per invocation.
    pub max_retries: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
    /// Timeout applied to each individual call.
    pub call_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration, call_timeout: Duration) -> Self {
        Self {
            max_retries,
            delay,
            call_timeout,
        }
    }

    /// Attempts actually made. A configured `0` still makes one call.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            delay: Duration::from_millis(settings.delay_ms),
            call_timeout: Duration::from_secs(settings.call_timeout_secs),
        }
    }
}
