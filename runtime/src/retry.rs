//! Exponential backoff.
//!
//! The worker asks [`RetryPolicy::delay_for_attempt`] how far to push a failed
//! job into the future. [`retry_while`] retries an in-process operation, such
//! as connecting to a store at startup.
//!
//! # Example
//!
//! ```rust
//! use herald_runtime::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_attempts(5)
//!     .initial_delay(Duration::from_secs(1))
//!     .max_delay(Duration::from_secs(60))
//!     .jitter(false)
//!     .build();
//!
//! assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
//! ```

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

/// How many times to run something and how long to wait in between.
///
/// Defaults: 5 attempts, 1s initial delay doubling up to 5 minutes, jittered.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of executions, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap for exponential backoff
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Randomise each delay within `[delay / 2, delay]`
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// Start from the defaults.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_attempts: None,
            initial_delay: None,
            max_delay: None,
            multiplier: None,
            jitter: None,
        }
    }

    /// Calculate the delay after the given failed attempt (0-based).
    ///
    /// `initial_delay * multiplier ^ attempt`, capped at `max_delay`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(64) as i32;
        let delay_ms = (self.initial_delay.as_millis() as f64) * self.multiplier.powi(exponent);
        let cap_ms = self.max_delay.as_millis() as f64;
        let capped = if delay_ms.is_finite() { delay_ms.min(cap_ms) } else { cap_ms };
        let delay = Duration::from_millis(capped.max(0.0) as u64);

        if self.jitter && !delay.is_zero() {
            let half = delay / 2;
            let half_ms = u64::try_from(half.as_millis()).unwrap_or(u64::MAX);
            let spread = rand::thread_rng().gen_range(0..=half_ms);
            half + Duration::from_millis(spread)
        } else {
            delay
        }
    }

    /// Whether another attempt is allowed after `attempts` executions.
    #[must_use]
    pub const fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
    jitter: Option<bool>,
}

impl RetryPolicyBuilder {
    /// Set the maximum number of executions.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the delay before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set the maximum delay.
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

    /// Enable or disable jitter.
    #[must_use]
    pub const fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Finish, filling unset fields with defaults.
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(5).max(1),
            initial_delay: self.initial_delay.unwrap_or(Duration::from_secs(1)),
            max_delay: self.max_delay.unwrap_or(Duration::from_secs(300)),
            multiplier: self.multiplier.unwrap_or(2.0),
            jitter: self.jitter.unwrap_or(true),
        }
    }
}

/// Run `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, or `policy.max_attempts` executions have been made.
///
/// Used at startup, where a store may still be coming up.
///
/// # Errors
///
/// The first non-retryable error, or the last error once attempts run out.
///
/// ```rust
/// use herald_runtime::retry::{RetryPolicy, retry_while};
///
/// # async fn connect() -> Result<(), String> {
/// let port = retry_while(
///     RetryPolicy::default(),
///     || async { Ok::<_, String>(5432) },
///     |err: &String| err.starts_with("refused"),
/// ).await?;
/// assert_eq!(port, 5432);
/// # Ok(())
/// # }
/// ```
pub async fn retry_while<F, Fut, T, E, P>(policy: RetryPolicy, mut operation: F, is_retryable: P) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut failures = 0;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if failures > 0 {
                    tracing::info!(failures, "Recovered after retrying");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !is_retryable(&err) {
            tracing::warn!(error = %err, "Permanent failure, not retrying");
            return Err(err);
        }
        if !policy.allows_retry(failures + 1) {
            tracing::error!(attempts = failures + 1, error = %err, "Giving up");
            return Err(err);
        }

        let delay = policy.delay_for_attempt(failures);
        tracing::warn!(attempt = failures + 1, delay_ms = delay.as_millis(), error = %err, "Transient failure, backing off");
        sleep(delay).await;
        failures += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn without_jitter(initial_ms: u64, max_ms: u64) -> RetryPolicy {
        RetryPolicy::builder()
            .initial_delay(Duration::from_millis(initial_ms))
            .max_delay(Duration::from_millis(max_ms))
            .jitter(false)
            .build()
    }

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(max_attempts)
            .initial_delay(Duration::from_millis(1))
            .jitter(false)
            .build()
    }

    /// Fails with `error` for the first `failures` calls, then yields the call count.
    fn flaky(calls: &Arc<AtomicU32>, failures: u32, error: &'static str) -> impl FnMut() -> std::future::Ready<Result<u32, &'static str>> {
        let calls = Arc::clone(calls);
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if n <= failures { Err(error) } else { Ok(n) })
        }
    }

    #[test]
    fn delay_doubles_from_the_initial_delay() {
        let policy = without_jitter(100, 10_000);
        let delays: Vec<u128> = (0..4).map(|n| policy.delay_for_attempt(n).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800]);
    }

    #[test]
    fn delay_is_capped() {
        let policy = without_jitter(1000, 2000);
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(2));
    }

    #[test]
    fn builder_never_allows_zero_attempts() {
        let policy = RetryPolicy::builder().max_attempts(0).build();
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.allows_retry(1));
    }

    #[test]
    fn jitter_spans_an_unbounded_cap() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_secs(1))
            .max_delay(Duration::MAX)
            .multiplier(1e30)
            .build();
        let delay = policy.delay_for_attempt(8);
        let ceiling = Duration::from_millis(u64::MAX);

        assert!(delay <= ceiling);
        assert!(delay >= ceiling / 2);
    }

    proptest! {
        #[test]
        fn jittered_delay_stays_within_half_and_full(attempt in 0u32..40) {
            let policy = RetryPolicy::builder()
                .initial_delay(Duration::from_millis(250))
                .max_delay(Duration::from_secs(60))
                .build();
            let ceiling = without_jitter(250, 60_000).delay_for_attempt(attempt);
            let delay = policy.delay_for_attempt(attempt);

            prop_assert!(delay <= ceiling);
            prop_assert!(delay >= ceiling / 2);
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = retry_while(quick(3), flaky(&calls, 2, "refused"), |_| true).await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = retry_while(quick(2), flaky(&calls, 10, "refused"), |_| true).await;
        assert_eq!(result, Err("refused"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = retry_while(quick(5), flaky(&calls, 10, "bad password"), |err| err.starts_with("refused")).await;
        assert_eq!(result, Err("bad password"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
