use serde::{Deserialize, Serialize};

use crate::SerializableSecretString;
use crate::shared::ValidationError;

/// Service-discovery environment variable for the object store host.
pub const OBJECT_STORE_HOST_ENV: &str = "MINIO_SERVICE_SERVICE_HOST";

/// Service-discovery environment variable for the object store port.
pub const OBJECT_STORE_PORT_ENV: &str = "MINIO_SERVICE_SERVICE_PORT";

fn default_disable_multipart() -> bool {
    true
}

/// Configuration for the S3-compatible object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ObjectStoreConfig {
    /// Hostname of the object store. Falls back to
    /// [`OBJECT_STORE_HOST_ENV`] when unset.
    #[serde(default)]
    pub host: Option<String>,
    /// Port of the object store. Falls back to [`OBJECT_STORE_PORT_ENV`]
    /// when unset.
    #[serde(default)]
    pub port: Option<String>,
    /// Access key for the store. Sensitive, redacted in debug output.
    pub access_key: SerializableSecretString,
    /// Secret key for the store. Sensitive, redacted in debug output.
    pub secret_key: SerializableSecretString,
    /// Bucket to provision at startup and use for all object operations.
    pub bucket_name: String,
    /// Whether multi-part transfer is disabled for object operations. This is
    /// carried on the returned handle, not acted on during provisioning.
    #[serde(default = "default_disable_multipart")]
    pub disable_multipart: bool,
}

impl ObjectStoreConfig {
    /// Resolves the endpoint URL, preferring configured values over the
    /// service-discovery environment variables.
    pub fn endpoint(&self) -> Result<String, ValidationError> {
        let host = self
            .host
            .clone()
            .or_else(|| std::env::var(OBJECT_STORE_HOST_ENV).ok())
            .ok_or(ValidationError::MissingObjectStoreHost(
                OBJECT_STORE_HOST_ENV,
            ))?;
        let port = self
            .port
            .clone()
            .or_else(|| std::env::var(OBJECT_STORE_PORT_ENV).ok())
            .ok_or(ValidationError::MissingObjectStorePort(
                OBJECT_STORE_PORT_ENV,
            ))?;

        Ok(format!("http://{host}:{port}"))
    }
}
