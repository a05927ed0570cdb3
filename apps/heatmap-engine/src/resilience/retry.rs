//! Bounded Retry With Backoff
//!
//! Generic retry wrapper used by every network-facing component. Each
//! caller tunes its own budget: the metadata loader keeps it shallow to
//! favor fast initial paint, the background reference backfill retries
//! deeper. After the budget is exhausted the final error propagates to
//! the caller; nothing here retries forever.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Classification hook deciding whether an error is worth retrying.
///
/// Transient transport failures retry; upstream contract violations and
/// configuration errors fail immediately regardless of remaining budget.
pub trait RetryClass {
    /// Whether another attempt could plausibly succeed.
    fn is_retryable(&self) -> bool;
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
    /// Jitter factor as a fraction (0.1 = ±10% randomization).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// A shallow budget for latency-sensitive callers.
    #[must_use]
    pub const fn shallow() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Backoff state across the attempts of a single operation.
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    current_delay: Duration,
    attempts: u32,
}

impl RetryPolicy {
    /// Create a fresh policy from a configuration.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            current_delay,
            attempts: 0,
        }
    }

    /// Next backoff delay, or `None` when the retry budget is spent.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_retries {
            return None;
        }
        self.attempts += 1;

        let delay = self.jittered(self.current_delay);

        let scaled = self.current_delay.as_millis() as f64 * self.config.multiplier;
        let next = if scaled.is_finite() && scaled > 0.0 {
            Duration::from_millis(scaled.round() as u64)
        } else {
            self.config.max_delay
        };
        self.current_delay = next.min(self.config.max_delay);

        Some(delay)
    }

    /// Retries performed so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reset after a success, for policies reused across calls.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempts = 0;
    }

    fn jittered(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }
        let base = duration.as_millis() as f64;
        let range = base * self.config.jitter_factor;
        let mut rng = rand::rng();
        let jitter: f64 = rng.random_range(-range..=range);
        Duration::from_millis((base + jitter).max(1.0) as u64)
    }
}

/// A single failed attempt, handed to the observer before backing off.
#[derive(Debug)]
pub struct RetryAttempt<'a, E> {
    /// 1-based retry number about to be performed.
    pub attempt: u32,
    /// Delay that will be slept before that retry.
    pub delay: Duration,
    /// The error that triggered the retry.
    pub error: &'a E,
}

/// Run `operation` with bounded retries, invoking `observer` before each
/// backoff sleep.
///
/// Non-retryable errors (per [`RetryClass`]) and budget exhaustion both
/// return the final error to the caller.
pub async fn retry_with_backoff_observed<T, E, F, Fut, O>(
    config: &RetryConfig,
    mut operation: F,
    mut observer: O,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryClass,
    O: FnMut(&RetryAttempt<'_, E>),
{
    let mut policy = RetryPolicy::new(config.clone());
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.is_retryable() {
                    return Err(error);
                }
                let Some(delay) = policy.next_delay() else {
                    return Err(error);
                };
                observer(&RetryAttempt {
                    attempt: policy.attempts(),
                    delay,
                    error: &error,
                });
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Run `operation` with bounded retries, logging each attempt.
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryClass + std::fmt::Display,
{
    retry_with_backoff_observed(config, operation, |attempt| {
        tracing::warn!(
            operation = operation_name,
            attempt = attempt.attempt,
            delay_ms = attempt.delay.as_millis() as u64,
            error = %attempt.error,
            "Retrying after failure"
        );
    })
    .await
}
