//! Timeout configuration for API requests.

use std::time::Duration;

/// Timeout configuration for a request.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeoutConfig {
    /// Connection timeout.
    pub connect: Duration,
    /// Total time per attempt, including reading the body.
    pub total: Duration,
}

impl TimeoutConfig {
    /// Create a new timeout configuration.
    pub fn new(connect: Duration, total: Duration) -> Self {
        Self { connect, total }
    }

    /// Create from a single total timeout.
    pub fn from_total(total: Duration) -> Self {
        Self {
            connect: total / 4,
            total,
        }
    }

    pub fn total_millis(&self) -> u64 {
        u64::try_from(self.total.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::from_total(Duration::from_secs(15))
    }
}

/// Timeout and retry policy applied to every request of a client.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchPolicy {
    pub timeout: TimeoutConfig,
    pub retry: crate::RetryPolicy,
}

impl FetchPolicy {
    pub fn new(timeout: TimeoutConfig, retry: crate::RetryPolicy) -> Self {
        Self { timeout, retry }
    }

    /// No retries; used by tests that count calls.
    pub fn single_attempt(total: Duration) -> Self {
        Self {
            timeout: TimeoutConfig::from_total(total),
            retry: crate::RetryPolicy::none(),
        }
    }
}
