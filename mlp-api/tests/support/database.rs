use mlp_config::SerializableSecretString;
use mlp_config::shared::{DatabaseConfig, IntoConnectOptions, MYSQL_DRIVER};
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{Connection, Executor, MySqlConnection, MySqlPool};
use uuid::Uuid;

/// Builds a config pointing at the MySQL server named by `TEST_MYSQL_HOST`,
/// with a unique throwaway catalog name.
///
/// Returns [`None`] when the variable is unset so callers can skip instead
/// of failing on machines without a server.
pub fn test_database_config() -> Option<DatabaseConfig> {
    let host = std::env::var("TEST_MYSQL_HOST").ok()?;
    let port = std::env::var("TEST_MYSQL_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(3306);
    let username = std::env::var("TEST_MYSQL_USER").unwrap_or_else(|_| "root".to_owned());
    let password = std::env::var("TEST_MYSQL_PASSWORD")
        .ok()
        .map(SerializableSecretString::from);

    Some(DatabaseConfig {
        driver: MYSQL_DRIVER.to_owned(),
        host,
        port,
        username,
        password,
        name: format!("mlp_test_{}", Uuid::new_v4().simple()),
        group_concat_max_len: 1024,
    })
}

/// Creates a new MySQL catalog and returns a pool connected to it.
///
/// # Panics
/// Panics if connection or catalog creation fails.
pub async fn create_test_database(config: &DatabaseConfig) -> MySqlPool {
    let options: MySqlConnectOptions = config.without_db();
    let mut connection = MySqlConnection::connect_with(&options)
        .await
        .expect("Failed to connect to MySQL");
    connection
        .execute(&*format!("create database `{}`", config.name))
        .await
        .expect("Failed to create database");
    let _ = connection.close().await;

    MySqlPool::connect_with(config.with_db())
        .await
        .expect("Failed to connect to MySQL")
}

/// Drops a test catalog. Used for cleanup, so a missing catalog is fine.
///
/// # Panics
/// Panics if connection or the drop statement fails.
pub async fn drop_test_database(config: &DatabaseConfig) {
    let options: MySqlConnectOptions = config.without_db();
    let mut connection = MySqlConnection::connect_with(&options)
        .await
        .expect("Failed to connect to MySQL");
    connection
        .execute(&*format!("drop database if exists `{}`", config.name))
        .await
        .expect("Failed to drop database");
    let _ = connection.close().await;
}
