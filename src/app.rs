use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::application::{IngestionService, RecoveryLoader, Workspace};
use crate::domain::error::Result;
use crate::infrastructure::activity_log::ActivityLog;
use crate::infrastructure::config::load_config;
use crate::infrastructure::store::open_store;
use crate::interfaces::http::{start_server, HttpState};

pub async fn run() -> Result<()> {
    let config = load_config()?;
    init_tracing(&config.log_filter);

    let activity = Arc::new(ActivityLog::new());
    let store = open_store(&config.store).await?;
    tracing::info!(backend = ?config.store.backend, "Document store ready");

    let workspace = Arc::new(Workspace::new());
    match RecoveryLoader::new(store.clone(), activity.clone()).load().await {
        Ok(recovered) => {
            tracing::info!(datasets = recovered.datasets.len(), "Recovered stored datasets");
            workspace.install_recovered(recovered.datasets, recovered.active);
        }
        Err(e) => {
            tracing::error!(error = %e, "Error fetching datasets on load");
            activity.error("Recovery", &format!("Could not load stored datasets: {}", e));
        }
    }

    let state = HttpState {
        ingestion: IngestionService::new(store, workspace.clone(), activity.clone()),
        workspace,
        activity,
        preview_rows: config.preview.default_rows,
    };

    let server = start_server(state, &config.server)?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "HTTP API listening"
    );
    server.await?;

    Ok(())
}

/// `RUST_LOG` takes precedence over the configured filter.
fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
