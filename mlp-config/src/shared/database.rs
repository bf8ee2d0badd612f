use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlConnectOptions;

use crate::SerializableSecretString;

/// The only relational driver with first-class support.
pub const MYSQL_DRIVER: &str = "mysql";

fn default_driver() -> String {
    MYSQL_DRIVER.to_string()
}

fn default_host() -> String {
    "mysql".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_username() -> String {
    "root".to_string()
}

fn default_group_concat_max_len() -> u32 {
    1024
}

/// Configuration for connecting to the relational metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Driver identifier. Anything other than [`MYSQL_DRIVER`] is rejected at
    /// startup.
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Hostname or IP address of the database server.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port the database server listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username for authenticating with the server.
    #[serde(default = "default_username")]
    pub username: String,
    /// Password for the specified user. Sensitive, redacted in debug output.
    /// Absent means an empty password.
    #[serde(default)]
    pub password: Option<SerializableSecretString>,
    /// Name of the catalog to create (when missing) and select.
    pub name: String,
    /// Session value for the engine's `group_concat_max_len` tunable, applied
    /// to every pooled connection.
    #[serde(default = "default_group_concat_max_len")]
    pub group_concat_max_len: u32,
}

/// Converts a connection config into driver-specific connect options.
///
/// Catalog creation has to happen before a catalog can be selected, so both
/// flavors are needed: [`IntoConnectOptions::without_db`] for administrative
/// statements against the bare server and [`IntoConnectOptions::with_db`] for
/// everything after.
pub trait IntoConnectOptions<Output> {
    /// Connect options targeting the server without a selected catalog.
    fn without_db(&self) -> Output;

    /// Connect options targeting the configured catalog.
    fn with_db(&self) -> Output;
}

impl IntoConnectOptions<MySqlConnectOptions> for DatabaseConfig {
    fn without_db(&self) -> MySqlConnectOptions {
        use secrecy::ExposeSecret;

        let options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username);

        if let Some(password) = &self.password {
            options.password(password.expose_secret())
        } else {
            options
        }
    }

    fn with_db(&self) -> MySqlConnectOptions {
        let options: MySqlConnectOptions = self.without_db();
        options.database(&self.name)
    }
}
