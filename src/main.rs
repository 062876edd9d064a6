use anyhow::Result;
use axum::Router;
use gcs_proxy::{
    config::{AppConfig, StoreBackend},
    routes::routes::routes,
    services::{filesystem_store::FilesystemStore, gcs_store::GcsStore, object_store::ObjectStore},
    state::AppState,
};
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting gcs-proxy with config: {:?}", cfg);

    // --- Object store ---
    let aliases = cfg.aliases();
    let store: Arc<dyn ObjectStore> = match cfg.store.backend {
        StoreBackend::Gcs => {
            let buckets = aliases.iter().map(|entry| entry.bucket.clone());
            let sa_path = cfg.store.service_account_file_path.as_deref();
            if sa_path.is_none() {
                tracing::info!("No service account file configured; using ambient GCS credentials");
            }
            Arc::new(GcsStore::connect(buckets, sa_path)?)
        }
        StoreBackend::Filesystem => {
            if !cfg.store.root_dir.is_dir() {
                tracing::warn!(
                    "Store root {} is not a directory; every object will be reported missing",
                    cfg.store.root_dir.display()
                );
            }
            Arc::new(FilesystemStore::new(cfg.store.root_dir.clone()))
        }
    };
    tracing::info!("Object store backend: {:?}", cfg.store.backend);

    if aliases.is_empty() {
        tracing::warn!("No bucket aliases configured; every request gets the informational page");
    }
    for entry in aliases.iter() {
        tracing::info!("Serving bucket {} under /{}/", entry.bucket, entry.alias);
    }

    // --- Build router ---
    let app: Router = routes(AppState::new(&cfg, store));

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolve on Ctrl-C so in-flight responses can finish.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
