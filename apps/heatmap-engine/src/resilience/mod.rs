//! Resilience utilities for network-facing components.

/// Bounded retry with exponential backoff and jitter.
pub mod retry;

pub use retry::{RetryAttempt, RetryClass, RetryConfig, RetryPolicy, retry_with_backoff};
