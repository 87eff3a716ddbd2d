use anyhow::Result;
use chartdock::config::RepoConfig;
use chartdock::repo::ChartRepo;
use chartdock::storage::FsStore;
use chartdock::{http, metrics};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chartdock=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Chartdock - Helm chart repository");

    let config = RepoConfig::from_env();

    let store = Arc::new(FsStore::open(&config.storage_path).await?);
    let repo = Arc::new(ChartRepo::new(store, config.base_url.clone(), config.auth.clone()));

    // Initialize metrics server (optional)
    let metrics_handle = match config.metrics_addr.clone() {
        Some(addr) => Some(metrics::start_metrics_server(addr).await?),
        None => None,
    };

    // Initialize chart API server
    let server_handle =
        http::start_server(repo, config.bind_addr.clone(), config.max_upload_bytes).await?;

    info!("Chartdock is running on {}", config.bind_addr);

    match metrics_handle {
        Some(metrics_handle) => {
            tokio::select! {
                _ = server_handle => info!("Chart repository server stopped"),
                _ = metrics_handle => info!("Metrics server stopped"),
            }
        },
        None => {
            server_handle.await?;
            info!("Chart repository server stopped");
        },
    }

    Ok(())
}
