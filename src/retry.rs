//! Bounded retry with a fixed sleep between attempts.
//!
//! Both the coarse per-collection prepare step (128 attempts, 120s sleep)
//! and the fine per-object copy (5 attempts, 2s sleep) go through the same
//! primitive. Only transient errors are re-attempted; cancellation aborts
//! the sleep immediately.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub sleep: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: usize, sleep: Duration) -> Self {
        Self { attempts, sleep }
    }
}

/// Per-collection prepare: safe to re-enter, so the budget is generous.
pub const PREPARE_RETRY: RetryPolicy = RetryPolicy::new(128, Duration::from_secs(120));

/// Per-object copy.
pub const COPY_RETRY: RetryPolicy = RetryPolicy::new(5, Duration::from_secs(2));

/// Run `op` until it succeeds, returns a non-transient error, or the
/// attempt budget is exhausted. The last error observed is the one
/// surfaced.
pub async fn retry<T, F, Fut>(token: &CancellationToken, policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < attempts => {
                warn!(attempt, max_attempts = attempts, error = %err, "retryable failure, sleeping before next attempt");
                tokio::select! {
                    _ = tokio::time::sleep(policy.sleep) => {}
                    _ = token.cancelled() => return Err(Error::Cancelled),
                }
            }
            Err(err) => return Err(err),
        }
    }
    unreachable!("retry loop returns from its last attempt")
}
