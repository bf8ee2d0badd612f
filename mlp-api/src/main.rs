use mlp_api::bootstrap::ClientManager;
use mlp_api::config::ApiConfig;
use mlp_config::load_config;
use mlp_config::shared::DatabaseConfig;
use mlp_telemetry::init_tracing;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    // Initialize tracing from the binary name.
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let config = load_config::<ApiConfig>()?;
    log_database_config(&config.database);

    // Any bootstrap error is fatal: the process must not serve traffic from
    // a partially initialized state.
    let client_manager = match ClientManager::init(&config).await {
        Ok(client_manager) => client_manager,
        Err(err) => {
            error!("fatal error during bootstrap: {err}");
            return Err(err.into());
        }
    };

    info!("bootstrap complete, service is ready");

    wait_for_shutdown().await;

    client_manager.close().await;
    info!("shut down cleanly");

    Ok(())
}

/// Blocks until SIGINT or SIGTERM, the latter being what Kubernetes sends
/// before killing the pod.
async fn wait_for_shutdown() {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("SIGINT (Ctrl+C) received, shutting down");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received, shutting down");
        }
    }
}

fn log_database_config(config: &DatabaseConfig) {
    info!(
        driver = config.driver,
        host = config.host,
        port = config.port,
        catalog = config.name,
        username = config.username,
        "database connection options",
    );
}
