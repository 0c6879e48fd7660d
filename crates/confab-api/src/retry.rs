//! Backoff policy for transient service failures.
//!
//! A self-hosted answering service goes down for mundane reasons: a restart
//! mid-ingest, or a container coming up before its index is loaded.
//! Idempotent requests therefore retry a few times with exponential backoff
//! before the failure surfaces to the conversation.

use confab_types::ApiError;
use rand::Rng;

/// How transient failures are retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt (0 disables retrying).
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Ceiling on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor applied per attempt.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_factor: 2.0,
        }
    }
}

/// Whether an error is transient enough to try again.
///
/// Rate limits, 5xx responses and transport failures qualify; 4xx responses
/// and undecodable bodies are deterministic and fail immediately.
pub fn is_retryable(error: &ApiError) -> bool {
    matches!(
        error,
        ApiError::RateLimited { .. }
            | ApiError::Server { .. }
            | ApiError::Network(_)
            | ApiError::Timeout
    )
}

/// Delay in milliseconds before retry number `attempt`.
///
/// A `Retry-After` the server sent wins outright; otherwise the delay is
/// `initial_delay_ms * backoff_factor^attempt` with ±25% jitter. Either way
/// the result is capped at `max_delay_ms`.
pub fn calculate_delay(config: &RetryConfig, attempt: u32, retry_after_ms: Option<u64>) -> u64 {
    if let Some(server_delay) = retry_after_ms {
        return server_delay.min(config.max_delay_ms);
    }

    let base = config.initial_delay_ms as f64 * config.backoff_factor.powi(attempt as i32);
    let capped = base.min(config.max_delay_ms as f64);

    // ±25% jitter
    let jittered = capped * rand::rng().random_range(0.75..=1.25);

    (jittered as u64).min(config.max_delay_ms)
}
