use std::time::Duration;

use parley_core::ChatError;
use tokio::time::sleep;
use tracing::warn;

/// Delays between attempts. An empty policy means a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    #[must_use]
    pub const fn none() -> Self {
        Self { delays: Vec::new() }
    }

    /// Total attempts, the first one included.
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
        ])
    }
}

/// Retry an async operation with backoff.
///
/// Only retryable (transient) errors are retried; any other error, or the
/// last transient one once the policy is exhausted, is returned as is.
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    policy: &RetryPolicy,
) -> Result<T, ChatError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ChatError>>,
{
    let mut delays = policy.delays.iter();
    let mut attempt = 1_usize;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() => {
                let Some(delay) = delays.next() else {
                    return Err(e);
                };
                warn!(
                    "Request failed (attempt {attempt}/{}): {e}. Retrying after {}ms...",
                    policy.max_attempts(),
                    delay.as_millis()
                );
                sleep(*delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
