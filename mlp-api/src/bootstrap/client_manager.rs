use sqlx::MySqlPool;
use tracing::info;

use crate::bootstrap::db::connect_database;
use crate::bootstrap::error::BootstrapResult;
use crate::bootstrap::object_store::{ObjectStoreHandle, provision_object_store};
use crate::bootstrap::schema::SchemaMigrator;
use crate::config::ApiConfig;
use crate::k8s::{KfamClient, KubeClients};

/// Composition root owning every long-lived client handle for the life of
/// the process.
///
/// Construction is strictly sequential: each step depends on the observable
/// state left by the previous one, and any error is terminal for startup.
/// Once built, every handle is safe for concurrent use by request-handling
/// workers without external locking; retries end here, there is no retry
/// policy after initialization.
pub struct ClientManager {
    db: MySqlPool,
    object_store: ObjectStoreHandle,
    kube: KubeClients,
    kfam: Option<KfamClient>,
}

impl ClientManager {
    /// Runs the full bootstrap sequence and returns the wired aggregate.
    pub async fn init(config: &ApiConfig) -> BootstrapResult<Self> {
        info!("initializing client manager");
        config.validate()?;

        let db = connect_database(&config.database, &config.init_retry).await?;
        SchemaMigrator::new(db.clone()).migrate().await?;

        let object_store = provision_object_store(&config.object_store, &config.init_retry).await?;

        let kube = KubeClients::connect(
            config.kubernetes.namespace.as_deref(),
            &config.init_retry,
        )
        .await?;

        // validate() already guaranteed the kfam section in multi-user mode.
        let kfam = match (&config.kfam, config.kubernetes.multi_user) {
            (Some(kfam), true) => Some(KfamClient::new(&kfam.host, kfam.port)),
            _ => None,
        };

        info!("client manager initialized successfully");

        Ok(Self {
            db,
            object_store,
            kube,
            kfam,
        })
    }

    pub fn db(&self) -> &MySqlPool {
        &self.db
    }

    pub fn object_store(&self) -> &ObjectStoreHandle {
        &self.object_store
    }

    pub fn kube(&self) -> &KubeClients {
        &self.kube
    }

    pub fn kfam(&self) -> Option<&KfamClient> {
        self.kfam.as_ref()
    }

    /// Releases the database pool and everything that needs explicit
    /// teardown. Called once at shutdown.
    pub async fn close(self) {
        self.db.close().await;
        info!("client manager closed");
    }
}
