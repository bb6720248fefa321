//! Retry with exponential backoff for transient driver failures.
//!
//! [`with_retry`] re-invokes a unit of work while it fails with a retryable
//! error (see [`crate::error::is_retryable`]), waiting an exponentially
//! growing, optionally jittered delay between attempts. Permanent errors and
//! ended contexts stop the loop immediately.

use crate::context::ExecutionContext;
use crate::error::{CollectorError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

const RETRY_SOURCE: &str = "retry";
const RETRY_OPERATION: &str = "with_retry";

/// Backoff policy for [`with_retry`].
///
/// Always valid: construct through [`RetryConfig::new`] or deserialize,
/// both of which reject out-of-range values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RetryConfigFile", into = "RetryConfigFile")]
pub struct RetryConfig {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
    jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    /// Creates a validated retry policy.
    ///
    /// # Errors
    /// Returns `INVALID_CONFIG` if `initial_backoff` is zero, `max_backoff` is
    /// below `initial_backoff`, `multiplier` is below 1, or `jitter` is
    /// outside `[0, 1]`.
    pub fn new(
        max_retries: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        multiplier: f64,
        jitter: f64,
    ) -> Result<Self> {
        let config = Self {
            max_retries,
            initial_backoff,
            max_backoff,
            multiplier,
            jitter,
        };
        config.validate()?;
        Ok(config)
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            jitter: 0.0,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(CollectorError::invalid_config(
                RETRY_SOURCE,
                "validate_config",
                message,
            ))
        };

        if self.initial_backoff.is_zero() {
            return invalid("initial_backoff must be greater than 0");
        }
        if self.max_backoff < self.initial_backoff {
            return invalid("max_backoff must not be less than initial_backoff");
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return invalid("multiplier must be a finite value of at least 1");
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return invalid("jitter must be within [0, 1]");
        }
        Ok(())
    }

    /// Retries allowed after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before the first retry.
    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    /// Upper bound on any un-jittered delay.
    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// Growth factor between consecutive delays.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Relative jitter applied to each delay.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Un-jittered delay preceding the attempt after `attempt`.
    ///
    /// `min(initial_backoff * multiplier^(attempt - 1), max_backoff)`, with
    /// `attempt` counted from 1.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return self.initial_backoff.min(self.max_backoff);
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let scaled = self.initial_backoff.as_nanos() as f64 * self.multiplier.powi(exponent);
        let ceiling = self.max_backoff.as_nanos() as f64;

        if !scaled.is_finite() || scaled >= ceiling {
            return self.max_backoff;
        }
        Duration::from_nanos(scaled.round() as u64)
    }

    /// Delay preceding the attempt after `attempt`, perturbed by jitter.
    ///
    /// The offset is uniform in `[-jitter * b, +jitter * b]` and the result
    /// is clamped at zero.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn jittered_backoff<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.backoff(attempt);
        if self.jitter <= 0.0 {
            return base;
        }

        let base_nanos = base.as_nanos() as f64;
        let offset = rng.random_range(-1.0..=1.0) * self.jitter * base_nanos;
        let jittered = (base_nanos + offset).max(0.0);
        Duration::from_nanos(jittered.round() as u64)
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        self.jittered_backoff(attempt, &mut rand::rng())
    }
}

/// On-disk form of [`RetryConfig`] with millisecond durations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct RetryConfigFile {
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    multiplier: f64,
    jitter: f64,
}

impl Default for RetryConfigFile {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl TryFrom<RetryConfigFile> for RetryConfig {
    type Error = CollectorError;

    fn try_from(file: RetryConfigFile) -> Result<Self> {
        RetryConfig::new(
            file.max_retries,
            Duration::from_millis(file.initial_backoff_ms),
            Duration::from_millis(file.max_backoff_ms),
            file.multiplier,
            file.jitter,
        )
    }
}

impl From<RetryConfig> for RetryConfigFile {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff_ms: u64::try_from(config.initial_backoff.as_millis())
                .unwrap_or(u64::MAX),
            max_backoff_ms: u64::try_from(config.max_backoff.as_millis()).unwrap_or(u64::MAX),
            multiplier: config.multiplier,
            jitter: config.jitter,
        }
    }
}

/// Result of a retried operation plus retry telemetry.
#[derive(Debug)]
pub struct RetryOutcome<T, E = CollectorError> {
    /// Final value or the error that ended the loop
    pub result: std::result::Result<T, E>,
    /// Invocations made; 1 means no retry happened
    pub attempts: u32,
    /// Wall time spent, including backoff waits
    pub total_duration: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    /// Whether the operation eventually succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Whether more than one attempt was made.
    pub fn retried(&self) -> bool {
        self.attempts > 1
    }

    /// Successful value, if any.
    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    /// Final error, if any.
    pub fn error(&self) -> Option<&E> {
        self.result.as_ref().err()
    }

    /// Discards the telemetry.
    pub fn into_result(self) -> std::result::Result<T, E> {
        self.result
    }
}

/// Runs `operation` under `config`, retrying retryable failures.
///
/// The loop ends on the first of:
/// - success;
/// - `ctx` having ended (the context error is returned, wrapping the last
///   failure);
/// - a non-retryable failure;
/// - `config.max_retries() + 1` attempts.
///
/// The first attempt is always made, even on an already-ended `ctx`, so a
/// succeeding operation still returns `Ok`. `operation` receives the context
/// and is expected to check it itself. Backoff waits end early when `ctx`
/// ends.
///
/// # Example
/// ```rust
/// use metasurveyor_core::{CollectorError, ExecutionContext, RetryConfig, with_retry};
/// use std::time::Duration;
///
/// # async fn example() {
/// let ctx = ExecutionContext::new();
/// let config = RetryConfig::new(2, Duration::from_millis(10), Duration::from_secs(1), 2.0, 0.0)
///     .expect("valid config");
///
/// let outcome = with_retry(&ctx, &config, |_ctx| async {
///     Ok::<_, CollectorError>(42)
/// })
/// .await;
/// assert_eq!(outcome.attempts, 1);
/// # }
/// ```
pub async fn with_retry<T, E, F, Fut>(
    ctx: &ExecutionContext,
    config: &RetryConfig,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(ExecutionContext) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::error::Error + From<CollectorError> + Send + Sync + 'static,
{
    let started = Instant::now();
    let max_attempts = config.max_attempts();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let err = match operation(ctx.clone()).await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::debug!(attempts, "operation succeeded after retry");
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts,
                    total_duration: started.elapsed(),
                };
            }
            Err(err) => err,
        };

        let finish = |result: std::result::Result<T, E>| RetryOutcome {
            result,
            attempts,
            total_duration: started.elapsed(),
        };

        if let Some(end) = ctx.end() {
            let classified = end
                .into_error(RETRY_SOURCE, RETRY_OPERATION)
                .with_cause(err);
            tracing::debug!(attempts, code = %classified.code(), "context ended, not retrying");
            return finish(Err(E::from(classified)));
        }

        if !crate::error::is_retryable(&err) {
            tracing::debug!(attempts, error = %err, "permanent failure, not retrying");
            return finish(Err(err));
        }

        if attempts >= max_attempts {
            tracing::warn!(attempts, error = %err, "retries exhausted");
            return finish(Err(err));
        }

        let delay = config.next_delay(attempts);
        tracing::debug!(
            attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "retryable failure, backing off"
        );

        if let Err(end) = ctx.run_until_done(tokio::time::sleep(delay)).await {
            let classified = end
                .into_error(RETRY_SOURCE, RETRY_OPERATION)
                .with_cause(err);
            tracing::debug!(attempts, code = %classified.code(), "context ended during backoff");
            return finish(Err(E::from(classified)));
        }
    }
}

/// Like [`with_retry`] but returns only the final result.
pub async fn retry<T, E, F, Fut>(
    ctx: &ExecutionContext,
    config: &RetryConfig,
    operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut(ExecutionContext) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::error::Error + From<CollectorError> + Send + Sync + 'static,
{
    with_retry(ctx, config, operation).await.into_result()
}
