use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::persistence::open_provider;
use crate::server::favicon::favicon_service;
use crate::server::flow::FlowEngine;
use crate::server::{self, AppState};

/// Run the broker until Ctrl+C is received.
pub async fn run_serve(config: Config) -> Result<()> {
    let http = super::http_client(config.server.token_timeout())?;
    let redirect_url = config.server.redirect_url();
    let provider = open_provider(&config.backend, &redirect_url, http)?;

    let favicon = config
        .dashboard
        .favicon_service
        .as_deref()
        .filter(|s| !s.is_empty())
        .and_then(favicon_service);

    let engine = Arc::new(FlowEngine::new(provider, config.flow.state_ttl()));
    let state = AppState::new(engine, favicon);

    tracing::info!("Redirect URL for file registrations: {}", redirect_url);
    server::serve(&config.server.bind_address(), state, shutdown_signal()).await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
