use std::future::Future;
use std::time::Duration;

use mlp_config::shared::RetryConfig;
use tokio::time::Instant;
use tracing::debug;

/// Exponential-backoff executor for fallible dial operations.
///
/// Repeatedly invokes an operation until it succeeds or the elapsed-time
/// budget runs out, sleeping between attempts with exponentially growing,
/// capped delays. The dialer does not classify errors; callers choose what
/// to retry by choosing what to pass in.
pub struct RetryDialer {
    initial_delay: Duration,
    max_delay: Duration,
    backoff_factor: f32,
    max_elapsed: Duration,
}

impl RetryDialer {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_factor: config.backoff_factor,
            max_elapsed: Duration::from_millis(config.max_elapsed_ms),
        }
    }

    /// Runs `operation` until it succeeds or the budget is exhausted.
    ///
    /// Returns the first success immediately. When the next backoff would
    /// overshoot the budget, the last observed error is returned instead of
    /// sleeping, so the call never overstays the budget by more than one
    /// attempt. Waiting happens in [`tokio::time::sleep`], which yields the
    /// thread and honors runtime cancellation mid-wait.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let started = Instant::now();
        let mut delay = self.initial_delay;
        let mut attempt: u32 = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if started.elapsed() + delay > self.max_elapsed {
                        return Err(error);
                    }

                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "attempt failed, backing off before retrying"
                    );
                    tokio::time::sleep(delay).await;

                    delay = delay.mul_f32(self.backoff_factor).min(self.max_delay);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn dialer(max_elapsed_ms: u64, initial_delay_ms: u64, max_delay_ms: u64) -> RetryDialer {
        RetryDialer::new(&RetryConfig {
            max_elapsed_ms,
            initial_delay_ms,
            max_delay_ms,
            backoff_factor: 2.0,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_returns_without_sleeping() {
        let started = Instant::now();

        let result = dialer(1_000, 300, 1_000)
            .run(|| async { Ok::<_, String>(42) })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_the_operation_succeeds() {
        let attempts = AtomicU32::new(0);

        let result = dialer(10_000, 100, 1_000)
            .run(|| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err("connection refused".to_string())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhaustion_surfaces_the_last_error() {
        let attempts = AtomicU32::new(0);
        let started = Instant::now();

        // Delays: 300ms, 600ms; the third failure would need another 1000ms,
        // overshooting the 1s budget, so the loop stops there.
        let result: Result<(), String> = dialer(1_000, 300, 1_000)
            .run(|| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("attempt {attempt} refused")) }
            })
            .await;

        assert_eq!(result, Err("attempt 2 refused".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() <= Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_growth_is_capped_at_max_delay() {
        let attempts = AtomicU32::new(0);

        // Uncapped, the second delay would be 10s and only two attempts would
        // fit in the budget. Capped at 250ms the schedule is 100, 250, 250,
        // 250ms of sleep, which allows five attempts.
        let dialer = RetryDialer::new(&RetryConfig {
            max_elapsed_ms: 1_000,
            initial_delay_ms: 100,
            max_delay_ms: 250,
            backoff_factor: 10.0,
        });

        let result: Result<(), String> = dialer
            .run(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err("still down".to_string()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
    }
}
