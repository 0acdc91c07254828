use anyhow::{Context, Result};
use media_store::{config::AppConfig, routes::routes, services::storage_service::StorageService};
use std::io::ErrorKind;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "media_store=info,tower_http=info".into()),
        )
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!(
        host = %cfg.host,
        port = cfg.port,
        storage_dir = %cfg.storage_dir.display(),
        public_prefix = %cfg.public_prefix,
        max_upload_bytes = cfg.max_upload_bytes,
        delete_secret = cfg.backend_secret.is_some(),
        "Starting media-store"
    );
    if cfg.backend_secret.is_none() {
        tracing::warn!("BACKEND_SECRET is not set; deletes are unauthenticated");
    }

    // --- Initialize core service (creates <root>/uploads) ---
    let storage = StorageService::new(&cfg)
        .await
        .with_context(|| format!("preparing storage at {}", cfg.storage_dir.display()))?;
    tracing::info!("Storage root at {}", storage.base_path.display());

    // --- Build router ---
    let app = routes::app(storage);

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
    axum::serve(listener, app).await?;

    Ok(())
}
