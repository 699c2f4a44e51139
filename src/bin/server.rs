//! HTTP server for the receipt and ledger-query API.

use anyhow::Result;
use quittung::api::{self, AppState};
use quittung::config::AppConfig;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        guard = ?config.guard,
        model = %config.llm.model,
        "starting quittung API server"
    );

    let state = Arc::new(AppState::from_config(&config)?);
    api::serve(config.bind_addr, state).await?;
    Ok(())
}
