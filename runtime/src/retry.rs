//! Retry coordination for the publish loop.
//!
//! A [`PublishError::Retry`](publisher_core::PublishError::Retry) raised by
//! the exception hook either yields a fresh attempt on a new request or
//! surfaces to the caller. The request decides whether it can be retried
//! ([`Request::supports_retry`]); the [`RetryPolicy`] adds an optional cap and
//! an optional back-off between attempts.
//!
//! # Example
//!
//! ```rust
//! use publisher_runtime::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_retries(3)
//!     .initial_delay(Duration::from_millis(5))
//!     .build();
//!
//! assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(10));
//! ```

use std::time::Duration;

use publisher_core::Request;
use serde::{Deserialize, Serialize};

/// Retry policy for the publish loop.
///
/// # Default Values
///
/// - `max_retries`: `None` (the request alone bounds retries)
/// - `initial_delay`: zero (retry immediately)
/// - `max_delay`: 1 second
/// - `multiplier`: 2.0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of fresh attempts after the first, if capped
    pub max_retries: Option<usize>,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap for the exponential back-off
    pub max_delay: Duration,
    /// Multiplier for exponential back-off
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::ZERO,
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_retries: None,
            initial_delay: None,
            max_delay: None,
            multiplier: None,
        }
    }

    /// Calculate the delay before retry number `attempt` (zero-based).
    ///
    /// Uses exponential backoff: delay = `initial_delay` * (multiplier ^ attempt)
    /// Capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        if attempt == 0 {
            return self.initial_delay.min(self.max_delay);
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        if secs.is_nan() || secs <= 0.0 {
            Duration::ZERO
        } else if secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Whether `retries` fresh attempts already reach the cap.
    #[must_use]
    pub fn exhausted(&self, retries: usize) -> bool {
        self.max_retries.is_some_and(|max| retries >= max)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_retries: Option<usize>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
}

impl RetryPolicyBuilder {
    /// Cap the number of fresh attempts.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set the delay before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set the maximum delay (cap for exponential backoff).
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the multiplier for exponential backoff.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: self.initial_delay.unwrap_or(defaults.initial_delay),
            max_delay: self.max_delay.unwrap_or(defaults.max_delay),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
        }
    }
}

/// What to do with a retry signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Produce a fresh request and start over, after `delay`.
    FreshAttempt {
        /// Back-off before the next attempt
        delay: Duration,
    },
    /// No fresh attempt; the signal surfaces to the loop's error handling.
    Surface,
}

/// Tracks retries across one publish call.
#[derive(Debug)]
pub struct RetryCoordinator<'a> {
    policy: &'a RetryPolicy,
    retries: usize,
}

impl<'a> RetryCoordinator<'a> {
    /// Start coordinating under `policy`.
    #[must_use]
    pub const fn new(policy: &'a RetryPolicy) -> Self {
        Self { policy, retries: 0 }
    }

    /// Decide whether `request` gets a fresh attempt.
    ///
    /// The request is only asked whether it supports retry when the cap has
    /// not been reached.
    pub fn decide<R>(&mut self, request: &R) -> RetryDecision
    where
        R: Request + ?Sized,
    {
        if self.policy.exhausted(self.retries) {
            tracing::warn!(
                retries = self.retries,
                "Retry limit reached, surfacing retry signal"
            );
            return RetryDecision::Surface;
        }

        if !request.supports_retry() {
            tracing::debug!(retries = self.retries, "Request does not support retry");
            return RetryDecision::Surface;
        }

        let delay = self.policy.delay_for_attempt(self.retries);
        self.retries += 1;
        RetryDecision::FreshAttempt { delay }
    }

    /// Fresh attempts granted so far
    #[must_use]
    pub const fn retries(&self) -> usize {
        self.retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{BaseRequest, Environment};

    #[test]
    fn test_retry_policy_delay_calculation() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(100))
            .multiplier(2.0)
            .max_delay(Duration::from_secs(10))
            .build();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn test_sub_millisecond_delays_keep_growing() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_micros(500))
            .multiplier(2.0)
            .max_delay(Duration::from_secs(1))
            .build();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_micros(500));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2));
    }

    #[test]
    fn test_huge_attempt_counts_saturate_at_max_delay() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(1))
            .multiplier(2.0)
            .max_delay(Duration::from_secs(5))
            .build();

        assert_eq!(policy.delay_for_attempt(usize::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_policy_max_delay_cap() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(1000))
            .multiplier(10.0)
            .max_delay(Duration::from_secs(2))
            .build();

        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(2));
    }

    #[test]
    fn test_default_policy_retries_immediately_without_cap() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for_attempt(7), Duration::ZERO);
        assert!(!policy.exhausted(1_000_000));
    }

    #[test]
    fn test_request_bounds_retries_without_a_cap() {
        let policy = RetryPolicy::default();
        let mut coordinator = RetryCoordinator::new(&policy);
        let request = BaseRequest::new(Environment::new()).with_max_retries(1);

        assert_eq!(
            coordinator.decide(&request),
            RetryDecision::FreshAttempt {
                delay: Duration::ZERO
            }
        );
        assert_eq!(coordinator.retries(), 1);

        let exhausted = BaseRequest::new(Environment::new());
        assert_eq!(coordinator.decide(&exhausted), RetryDecision::Surface);
    }

    #[test]
    fn test_cap_surfaces_even_when_the_request_could_retry() {
        let policy = RetryPolicy::builder().max_retries(1).build();
        let mut coordinator = RetryCoordinator::new(&policy);
        let request = BaseRequest::new(Environment::new()).with_max_retries(10);

        assert!(matches!(
            coordinator.decide(&request),
            RetryDecision::FreshAttempt { .. }
        ));
        assert_eq!(coordinator.decide(&request), RetryDecision::Surface);
        assert_eq!(coordinator.retries(), 1);
    }
}
