//! Bounded retry with exponential backoff
//!
//! Only [`Error::is_transient`] failures are retried. Everything else is
//! returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use tenantry_core::Result;
use tracing::{info, warn};

use crate::config::RetryPolicy;

/// Runs `operation` until it succeeds, fails permanently, or the attempts run out
pub async fn retry_transient<T, F, Fut>(policy: &RetryPolicy, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    let mut delay = policy.initial_delay;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("{} succeeded after {} attempt(s)", what, attempt);
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    what, attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                delay = next_delay(delay, policy.max_delay);
            }
            Err(e) => return Err(e),
        }
    }
}

fn next_delay(current: Duration, max: Duration) -> Duration {
    std::cmp::min(current.saturating_mul(2), max)
}
