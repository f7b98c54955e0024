//! SmartGrid ingestion service
//!
//! Loads the service config (path from `SMARTGRID_CONFIG`, default
//! `smartgrid.json`), opens the sample logs, and serves the session API
//! until Ctrl+C. Missing or invalid thresholds abort startup.

use smartgrid_core::{FileSink, IngestionSession, LogListener, ServiceConfig};
use smartgrid_server::{AppState, ServerConfig};
use std::path::PathBuf;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("smartgrid=info".parse().unwrap()),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Service error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config_path = std::env::var("SMARTGRID_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("smartgrid.json"));

    let config = ServiceConfig::load(&config_path)?;
    let thresholds = config.thresholds()?;

    let sink = FileSink::new(config.accepted_path(), config.rejected_path());
    let mut session = IngestionSession::new(thresholds, sink);
    session.subscribe(LogListener);

    let state = AppState::new(session, ServerConfig::from(config.server.clone()))?;
    tracing::info!(
        port = state.config.port,
        accepted_log = %config.accepted_path().display(),
        rejected_log = %config.rejected_path().display(),
        "SmartGrid service starting"
    );

    smartgrid_server::start_server(state).await
}
