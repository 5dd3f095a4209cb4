use std::time::Duration;

use ciw_core::error::AppError;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum AttemptError {
    /// Downstream asked us to slow down; worth another attempt after the fixed delay.
    RateLimited(String),
    Fatal(AppError),
}

/// Run `attempt` until it succeeds, fails fatally, or rate limiting outlasts the policy.
pub fn with_fixed_backoff<T>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: impl FnMut(u32) -> Result<T, AttemptError>,
) -> Result<T, AppError> {
    let mut last = String::new();
    for n in 1..=policy.max_attempts {
        match attempt(n) {
            Ok(v) => return Ok(v),
            Err(AttemptError::Fatal(e)) => return Err(e),
            Err(AttemptError::RateLimited(details)) => {
                warn!(
                    operation,
                    attempt = n,
                    max_attempts = policy.max_attempts,
                    details = %details,
                    "tracker rate limited"
                );
                last = details;
                if n < policy.max_attempts {
                    std::thread::sleep(policy.delay);
                }
            }
        }
    }
    Err(
        AppError::new("TRACKER_RATE_LIMITED", "Tracker rate limit outlasted retries")
            .with_details(format!(
                "operation={operation}; attempts={}; last={last}",
                policy.max_attempts
            ))
            .with_retryable(true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_rate_limits_then_succeeds() {
        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        let mut calls = 0;
        let out = with_fixed_backoff(&policy, "list", |_| {
            calls += 1;
            if calls < 3 {
                Err(AttemptError::RateLimited("status=429".to_string()))
            } else {
                Ok(42)
            }
        });
        assert_eq!(out, Ok(42));
        assert_eq!(calls, 3);
    }

    #[test]
    fn exhaustion_is_a_retryable_error() {
        let policy = RetryPolicy::fixed(2, Duration::ZERO);
        let mut calls = 0;
        let err = with_fixed_backoff::<()>(&policy, "close", |_| {
            calls += 1;
            Err(AttemptError::RateLimited("status=429".to_string()))
        })
        .unwrap_err();
        assert_eq!(calls, 2);
        assert_eq!(err.code, "TRACKER_RATE_LIMITED");
        assert!(err.retryable);
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let policy = RetryPolicy::fixed(5, Duration::ZERO);
        let mut calls = 0;
        let err = with_fixed_backoff::<()>(&policy, "create", |_| {
            calls += 1;
            Err(AttemptError::Fatal(AppError::new("TRACKER_REQUEST_FAILED", "nope")))
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(err.code, "TRACKER_REQUEST_FAILED");
    }

    #[test]
    fn zero_attempts_is_raised_to_one() {
        assert_eq!(RetryPolicy::fixed(0, Duration::ZERO).max_attempts, 1);
    }
}
