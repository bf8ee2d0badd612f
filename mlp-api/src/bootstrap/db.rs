use mlp_config::shared::{
    DatabaseConfig, IntoConnectOptions, MYSQL_DRIVER, RetryConfig,
};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::{Connection, Executor, MySqlConnection, MySqlPool};
use tracing::info;

use crate::bootstrap::error::{BootstrapError, BootstrapResult};
use crate::bootstrap::retry::RetryDialer;

/// Dials the relational store, ensures the target catalog exists, and
/// returns a pooled handle to it.
///
/// Three budgeted phases: reach the server without selecting a catalog,
/// create the catalog if it is missing, then open the pool against it. Each
/// phase gets the full retry budget; exhausting any of them is fatal because
/// continuing with a half-provisioned store would be worse than not starting.
///
/// The returned pool is safe for concurrent use from any number of workers
/// and maintains its own idle connections; that property comes from the
/// driver and is not reimplemented here.
pub async fn connect_database(
    config: &DatabaseConfig,
    retry: &RetryConfig,
) -> BootstrapResult<MySqlPool> {
    if config.driver != MYSQL_DRIVER {
        return Err(BootstrapError::UnsupportedDriver(config.driver.clone()));
    }

    let dialer = RetryDialer::new(retry);
    let admin_options: MySqlConnectOptions = config.without_db();

    // Phase 1: the catalog may not exist yet, so the first connection
    // deliberately selects none.
    let connection = dialer
        .run(|| {
            let options = admin_options.clone();
            async move { MySqlConnection::connect_with(&options).await }
        })
        .await?;
    let _ = connection.close().await;
    info!(host = config.host, port = config.port, "database server reachable");

    // Phase 2: catalog creation, with its own budget. Every attempt opens a
    // fresh connection so a connection wedged by a previous attempt cannot
    // stall the loop.
    let create_catalog = format!("create database if not exists `{}`", config.name);
    dialer
        .run(|| {
            let options = admin_options.clone();
            let statement = create_catalog.clone();
            async move {
                let mut connection = MySqlConnection::connect_with(&options).await?;
                connection.execute(statement.as_str()).await?;
                connection.close().await
            }
        })
        .await?;
    info!(catalog = config.name, "catalog present");

    // Phase 3: the pooled handle used for the rest of the process lifetime.
    let group_concat_max_len = config.group_concat_max_len;
    let pool = dialer
        .run(|| {
            let options = config.with_db();
            async move {
                MySqlPoolOptions::new()
                    .after_connect(move |conn, _meta| {
                        Box::pin(async move {
                            let statement =
                                format!("set session group_concat_max_len = {group_concat_max_len}");
                            conn.execute(statement.as_str()).await?;
                            Ok(())
                        })
                    })
                    .connect_with(options)
                    .await
            }
        })
        .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_driver(driver: &str) -> DatabaseConfig {
        DatabaseConfig {
            driver: driver.to_string(),
            host: "127.0.0.1".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: None,
            name: "mlpipeline".to_string(),
            group_concat_max_len: 1024,
        }
    }

    #[tokio::test]
    async fn unsupported_driver_fails_before_dialing() {
        let config = config_with_driver("sqlite3");

        let error = connect_database(&config, &RetryConfig::default())
            .await
            .expect_err("sqlite3 must be rejected");

        assert!(matches!(
            error,
            BootstrapError::UnsupportedDriver(driver) if driver == "sqlite3"
        ));
    }
}
