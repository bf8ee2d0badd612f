use serde::{Deserialize, Serialize};

/// Backoff policy for dialing external infrastructure during startup.
///
/// Every dial (database server, catalog creation, object store, Kubernetes
/// API) gets its own full elapsed-time budget; exhausting a budget is fatal.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum total time, in milliseconds, spent on one dial before the
    /// last error is surfaced.
    pub max_elapsed_ms: u64,
    /// Delay, in milliseconds, before the first retry.
    pub initial_delay_ms: u64,
    /// Upper bound on the delay between retries.
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_elapsed_ms: 360_000,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
        }
    }
}
