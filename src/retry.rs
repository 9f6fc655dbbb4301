//! Retry classification and backoff policy.
//!
//! [`RetryPolicy`] decides whether a completed attempt is worth repeating and how
//! long to wait before the next one. It holds no mutable state, so a single policy
//! is shared by every call a [`Client`](crate::Client) makes.

use crate::backoff;
use crate::transport::RawResponse;
use crate::{Error, Result};
use http::StatusCode;
use std::time::Duration;

/// Returns `true` for statuses that signal a transient upstream condition.
///
/// Only 429, 500, 502, 503 and 504 qualify. Other 5xx codes such as
/// 501 Not Implemented describe permanent conditions.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Defines how many times a call is retried and how long to wait in between.
///
/// # Examples
///
/// ```
/// use rampart::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy {
///     max_retries: 3,
///     wait_min: Duration::from_millis(10),
///     wait_max: Duration::from_millis(100),
/// };
///
/// let delay = policy.backoff(0);
/// assert!(delay >= policy.wait_min && delay <= policy.wait_max);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a call makes at most `max_retries + 1` attempts.
    pub max_retries: usize,
    /// Lower bound of every wait between attempts.
    pub wait_min: Duration,
    /// Upper bound of every wait between attempts.
    pub wait_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            wait_min: Duration::from_millis(100),
            wait_max: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            wait_min: Duration::ZERO,
            wait_max: Duration::ZERO,
        }
    }

    /// Classifies a completed attempt.
    ///
    /// An error takes precedence over a response. Transient transport faults are
    /// retryable, as are responses with a status accepted by
    /// [`is_retryable_status`]. With neither a response nor an error there is
    /// nothing to retry.
    ///
    /// # Examples
    ///
    /// ```
    /// use rampart::{Error, RetryPolicy, TransportErrorKind};
    ///
    /// let policy = RetryPolicy::default();
    /// assert!(!policy.should_retry(None, None));
    ///
    /// let refused = Error::transport(TransportErrorKind::ConnectionRefused, "refused");
    /// assert!(policy.should_retry(None, Some(&refused)));
    /// ```
    pub fn should_retry(&self, response: Option<&RawResponse>, error: Option<&Error>) -> bool {
        if let Some(error) = error {
            return error.is_retryable();
        }
        match response {
            Some(response) => is_retryable_status(response.status),
            None => false,
        }
    }

    /// Returns the wait before the retry that follows `attempt` (0-indexed).
    pub fn backoff(&self, attempt: usize) -> Duration {
        let attempt = u32::try_from(attempt).unwrap_or(u32::MAX);
        backoff::exponential(attempt, self.wait_min, self.wait_max)
    }

    /// Checks that the wait bounds are consistent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `wait_max` is non-zero and smaller than
    /// `wait_min`.
    pub fn validate(&self) -> Result<()> {
        if !self.wait_max.is_zero() && self.wait_min > self.wait_max {
            return Err(Error::ConfigurationError(format!(
                "retry wait min ({:?}) must not exceed retry wait max ({:?})",
                self.wait_min, self.wait_max
            )));
        }
        Ok(())
    }
}
