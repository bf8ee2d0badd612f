use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use mlp_config::shared::{ObjectStoreConfig, RetryConfig};
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::bootstrap::error::{BootstrapError, BootstrapResult};
use crate::bootstrap::provision::{ProvisionOutcome, classify_provision};
use crate::bootstrap::retry::RetryDialer;

/// S3-compatible stores ignore the region but the SDK requires one.
const DEFAULT_REGION: &str = "us-east-1";

/// Live handle to the provisioned object store.
///
/// Carries the bucket every object operation targets and the multipart
/// transfer policy decided at configuration time. The underlying client is
/// concurrency-safe and cheap to clone.
#[derive(Clone)]
pub struct ObjectStoreHandle {
    client: Client,
    bucket: String,
    disable_multipart: bool,
}

impl ObjectStoreHandle {
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn multipart_disabled(&self) -> bool {
        self.disable_multipart
    }
}

/// Dials the object store and idempotently ensures the configured bucket
/// exists.
///
/// Reachability (and credential validity) is probed through the retry
/// dialer, so a store that is merely slow to come up does not abort startup.
/// Bucket creation is the two-phase idempotent pattern: attempt creation,
/// and on failure accept a confirmed pre-existing bucket as success.
pub async fn provision_object_store(
    config: &ObjectStoreConfig,
    retry: &RetryConfig,
) -> BootstrapResult<ObjectStoreHandle> {
    let endpoint = config.endpoint()?;

    let credentials = aws_sdk_s3::config::Credentials::new(
        config.access_key.expose_secret(),
        config.secret_key.expose_secret(),
        None,
        None,
        "static",
    );
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(DEFAULT_REGION))
        .credentials_provider(credentials)
        .endpoint_url(&endpoint)
        .load()
        .await;
    // Path-style addressing: bucket-as-subdomain does not resolve against a
    // single in-cluster endpoint.
    let store_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(true)
        .build();
    let client = Client::from_conf(store_config);

    // The SDK client itself is lazy; dial the endpoint here so transient
    // startup unavailability is absorbed now rather than at first use. Bad
    // credentials fail every attempt and become fatal on budget exhaustion.
    let dialer = RetryDialer::new(retry);
    dialer
        .run(|| {
            let client = client.clone();
            async move { client.list_buckets().send().await }
        })
        .await
        .map_err(|error| {
            BootstrapError::ObjectStore(format!(
                "store at {endpoint} not usable within the configured budget: {}",
                DisplayErrorContext(&error)
            ))
        })?;
    debug!(endpoint, "object store reachable");

    ensure_bucket(&client, &config.bucket_name).await?;

    Ok(ObjectStoreHandle {
        client,
        bucket: config.bucket_name.clone(),
        disable_multipart: config.disable_multipart,
    })
}

async fn ensure_bucket(client: &Client, bucket: &str) -> BootstrapResult<()> {
    let creation = client.create_bucket().bucket(bucket).send().await;

    let creation_error = match creation {
        Ok(_) => {
            info!(bucket, "created object store bucket");
            return Ok(());
        }
        Err(error) => error,
    };

    let present = match client.head_bucket().bucket(bucket).send().await {
        Ok(_) => Some(true),
        Err(error) => match error.as_service_error() {
            Some(service_error) if service_error.is_not_found() => Some(false),
            // The probe itself failed; it says nothing about the bucket.
            _ => None,
        },
    };

    match classify_provision(false, present) {
        ProvisionOutcome::AlreadyPresent => {
            info!(bucket, "bucket already exists, nothing to provision");
            Ok(())
        }
        _ => Err(BootstrapError::ObjectStore(format!(
            "failed to create bucket `{bucket}`: {}",
            DisplayErrorContext(&creation_error)
        ))),
    }
}
