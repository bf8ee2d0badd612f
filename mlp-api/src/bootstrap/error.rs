use mlp_config::shared::ValidationError;
use thiserror::Error;

/// Convenient result type for bootstrap operations.
pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// Fatal startup errors.
///
/// Every variant aborts startup; transient infrastructure failures only show
/// up here once a retry budget is exhausted. The binary boundary decides to
/// terminate the process, keeping the bootstrap sequence itself testable
/// through return values.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database driver `{0}` is not supported")]
    UnsupportedDriver(String),

    #[error("database unavailable within the configured budget: {0}")]
    Database(#[from] sqlx::Error),

    #[error("schema migration failed at `{step}`: {source}")]
    Migration {
        step: &'static str,
        source: sqlx::Error,
    },

    #[error("pipeline version backfill failed and was rolled back: {0}")]
    Backfill(sqlx::Error),

    #[error("object store provisioning failed: {0}")]
    ObjectStore(String),

    #[error("kubernetes client construction failed: {0}")]
    Kubernetes(#[from] kube::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),
}
