use serde::Deserialize;
use thiserror::Error;

/// Errors emitted by the membership service client.
#[derive(Debug, Error)]
pub enum KfamError {
    #[error("request to the membership service failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("membership service answered with unexpected status {0}")]
    UnexpectedStatus(reqwest::StatusCode),
}

#[derive(Debug, Deserialize)]
struct BindingList {
    #[serde(default)]
    bindings: Vec<Binding>,
}

#[derive(Debug, Deserialize)]
struct Binding {
    #[serde(rename = "referredNamespace", default)]
    referred_namespace: Option<String>,
}

/// Thin client for the profile membership (KFAM) service.
///
/// Only constructed in multi-user mode. The single call the server needs is
/// whether a user has a binding in a namespace.
pub struct KfamClient {
    http: reqwest::Client,
    base_url: String,
}

impl KfamClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("http://{host}:{port}"),
        }
    }

    /// Returns whether `user` holds a binding in `namespace`.
    pub async fn is_authorized(&self, user: &str, namespace: &str) -> Result<bool, KfamError> {
        let response = self
            .http
            .get(format!("{}/kfam/v1/bindings", self.base_url))
            .query(&[("user", user), ("namespace", namespace)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(KfamError::UnexpectedStatus(response.status()));
        }

        let bindings: BindingList = response.json().await?;
        Ok(bindings
            .bindings
            .iter()
            .any(|binding| binding.referred_namespace.as_deref() == Some(namespace)))
    }
}
