use std::{future::Future, time::Duration};

use super::ClientError;

pub const MAX_ATTEMPTS: u32 = 3;
pub const BASE_DELAY: Duration = Duration::from_millis(100);

/// Delay before retry number `attempt` (1-based): 100ms, 200ms, 400ms...
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt.saturating_sub(1))
}

/// Runs an idempotent read, retrying transport failures and 5xx responses.
/// Anything else is returned on the first failure.
pub async fn with_backoff<T, F, Fut>(op: F) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    retry_with(MAX_ATTEMPTS, BASE_DELAY, op).await
}

pub async fn retry_with<T, F, Fut>(
    max_attempts: u32,
    base: Duration,
    mut op: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = backoff_delay(base, attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying request");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
