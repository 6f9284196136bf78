use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug)]
pub enum RetryError<E> {
    Permanent(E),
    Exhausted { attempts: u32, last: E },
}

/// Delay before the attempt following attempt number `attempt` (1-based):
/// `base_delay * 2^(attempt - 1)`.
pub fn backoff_delay(cfg: &RetryConfig, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    cfg.base_delay.saturating_mul(1u32 << shift)
}

pub async fn retry<F, Fut, T, E>(cfg: &RetryConfig, mut f: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let max_attempts = cfg.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match f().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !err.is_retryable() {
                    tracing::warn!(attempt = attempt, "non-retryable error: {}", err);
                    return Err(RetryError::Permanent(err));
                }

                if attempt >= max_attempts {
                    tracing::warn!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        "giving up after error: {}",
                        err
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }

                let delay = backoff_delay(cfg, attempt);
                tracing::warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after error: {}",
                    err
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
