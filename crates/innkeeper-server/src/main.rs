#![doc = include_str!("../README.md")]

mod config;
mod http;

use clap::Parser;
use config::{CliArgs, ServerConfig};
use http::AppState;
use innkeeper::OwnershipResolver;
use innkeeper_rest::RestPort;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = Arc::new(RestPort::with_timeout(
        config.webhook_url.clone(),
        config.resolver.request_timeout,
    ));
    let resolver = Arc::new(OwnershipResolver::new(config.resolver.clone(), port)?);

    let app = http::router(AppState { resolver });
    let listener = TcpListener::bind(&config.server_addr).await?;
    tracing::info!(
        addr = %config.server_addr,
        fields = ?config.resolver.candidate_fields,
        "starting ownership resolution service"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("service shut down successfully");
    Ok(())
}

async fn shutdown_signal() {
    if signal::ctrl_c().await.is_err() {
        tracing::error!("failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
