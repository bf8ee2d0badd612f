use mlp_config::shared::{DatabaseConfig, ObjectStoreConfig, RetryConfig, ValidationError};
use serde::Deserialize;

/// Complete configuration for the pipeline metadata API server.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Relational metadata store connection settings.
    pub database: DatabaseConfig,
    /// Object store connection and bucket settings.
    pub object_store: ObjectStoreConfig,
    /// Backoff policy applied to every infrastructure dial during startup.
    #[serde(default)]
    pub init_retry: RetryConfig,
    /// Kubernetes-facing collaborator settings.
    pub kubernetes: KubernetesConfig,
    /// Membership service settings, required in multi-user mode.
    pub kfam: Option<KfamConfig>,
}

/// Settings scoping the Kubernetes-facing collaborator clients.
#[derive(Debug, Clone, Deserialize)]
pub struct KubernetesConfig {
    /// Namespace the workflow, scheduled-workflow, and pod clients operate
    /// in. When unset, the ambient kubeconfig's default namespace is used.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Whether the server runs in multi-user (multi-tenant) mode.
    #[serde(default)]
    pub multi_user: bool,
}

/// Location of the profile membership (KFAM) service.
#[derive(Debug, Clone, Deserialize)]
pub struct KfamConfig {
    pub host: String,
    pub port: u16,
}

impl ApiConfig {
    /// Checks cross-field requirements that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.kubernetes.multi_user {
            if self.kubernetes.namespace.is_none() {
                return Err(ValidationError::MissingNamespace);
            }
            if self.kfam.is_none() {
                return Err(ValidationError::MissingKfamConfig);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config(multi_user: bool) -> ApiConfig {
        serde_json::from_str(&format!(
            r#"{{
                "database": {{ "name": "mlpipeline" }},
                "object_store": {{
                    "access_key": "minio",
                    "secret_key": "minio123",
                    "bucket_name": "mlpipeline"
                }},
                "kubernetes": {{ "multi_user": {multi_user} }}
            }}"#
        ))
        .expect("config should parse")
    }

    #[test]
    fn single_user_mode_needs_no_namespace() {
        let config = minimal_config(false);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn multi_user_mode_requires_namespace_and_kfam() {
        let mut config = minimal_config(true);
        assert!(config.validate().is_err());

        config.kubernetes.namespace = Some("kubeflow".to_string());
        assert!(config.validate().is_err());

        config.kfam = Some(KfamConfig {
            host: "profiles-kfam".to_string(),
            port: 8081,
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn retry_policy_defaults_when_absent() {
        let config = minimal_config(false);
        assert_eq!(config.init_retry.max_elapsed_ms, 360_000);
        assert_eq!(config.init_retry.initial_delay_ms, 500);
    }
}
