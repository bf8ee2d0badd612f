//! Kubernetes-facing collaborators for the pipeline metadata service.
//!
//! These are construction-only wrappers around already-stable SDKs: the
//! workflow and scheduled-workflow custom resources and the pod API are
//! handled through the [`kube`] crate against the ambient configuration
//! (in-cluster or local `~/.kube/config`), and the profile membership
//! service is a plain HTTP client. No business logic lives here; the
//! bootstrap sequence only guarantees the handles are live before the
//! server starts.

mod clients;
mod kfam;

pub use clients::KubeClients;
pub use kfam::{KfamClient, KfamError};
