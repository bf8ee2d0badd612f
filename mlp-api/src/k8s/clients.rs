use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ApiResource, DynamicObject};
use kube::core::GroupVersionKind;
use mlp_config::shared::RetryConfig;
use tracing::info;

use crate::bootstrap::{BootstrapResult, RetryDialer};

/// Typed handles to the Kubernetes resources the server manages.
///
/// The workflow engine's resources are CRDs, so they are addressed
/// dynamically by group/version/kind rather than through generated types.
pub struct KubeClients {
    workflows: Api<DynamicObject>,
    scheduled_workflows: Api<DynamicObject>,
    pods: Api<Pod>,
}

impl KubeClients {
    /// Connects to the cluster and builds the namespaced handles.
    ///
    /// Client construction reads the ambient kubeconfig and dials the API
    /// server, so it runs through the retry dialer like every other
    /// infrastructure dial at startup. With no namespace configured, the
    /// kubeconfig's default namespace scopes the handles.
    pub async fn connect(
        namespace: Option<&str>,
        retry: &RetryConfig,
    ) -> BootstrapResult<Self> {
        let dialer = RetryDialer::new(retry);
        let client = dialer.run(kube::Client::try_default).await?;

        let workflows = ApiResource::from_gvk(&GroupVersionKind::gvk(
            "argoproj.io",
            "v1alpha1",
            "Workflow",
        ));
        let scheduled_workflows = ApiResource::from_gvk(&GroupVersionKind::gvk(
            "kubeflow.org",
            "v1beta1",
            "ScheduledWorkflow",
        ));

        let clients = match namespace {
            Some(namespace) => Self {
                workflows: Api::namespaced_with(client.clone(), namespace, &workflows),
                scheduled_workflows: Api::namespaced_with(
                    client.clone(),
                    namespace,
                    &scheduled_workflows,
                ),
                pods: Api::namespaced(client, namespace),
            },
            None => Self {
                workflows: Api::default_namespaced_with(client.clone(), &workflows),
                scheduled_workflows: Api::default_namespaced_with(
                    client.clone(),
                    &scheduled_workflows,
                ),
                pods: Api::default_namespaced(client),
            },
        };

        info!(namespace = namespace.unwrap_or("<default>"), "kubernetes clients ready");

        Ok(clients)
    }

    pub fn workflows(&self) -> &Api<DynamicObject> {
        &self.workflows
    }

    pub fn scheduled_workflows(&self) -> &Api<DynamicObject> {
        &self.scheduled_workflows
    }

    pub fn pods(&self) -> &Api<Pod> {
        &self.pods
    }
}
