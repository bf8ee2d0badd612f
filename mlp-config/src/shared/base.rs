use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Multi-user mode scopes collaborator clients by namespace, so one must
    /// be configured.
    #[error("`kubernetes.namespace` must be set when `kubernetes.multi_user` is true")]
    MissingNamespace,
    /// Multi-user mode authorizes requests through the membership service.
    #[error("`kfam` must be configured when `kubernetes.multi_user` is true")]
    MissingKfamConfig,
    /// No object store host in configuration and no service-discovery
    /// environment variable to fall back to.
    #[error("`object_store.host` is not set and `{0}` is not present in the environment")]
    MissingObjectStoreHost(&'static str),
    /// No object store port in configuration and no service-discovery
    /// environment variable to fall back to.
    #[error("`object_store.port` is not set and `{0}` is not present in the environment")]
    MissingObjectStorePort(&'static str),
}
