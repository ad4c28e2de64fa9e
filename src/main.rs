// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process::ExitCode, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use relational_oidc_rp::api;
use relational_oidc_rp::auth::{
    AccessTokenAuthenticator, ClientRegistry, ReqwestTransport, ResultCache, TokenValidator,
};
use relational_oidc_rp::config::{load_clients_file, LogFormat, RuntimeConfig, DEFAULT_LOG_FILTER};
use relational_oidc_rp::state::AppState;

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_target(true).boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(true).boxed(),
    };
    tracing_subscriber::registry().with(layer.with_filter(filter)).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

async fn run(config: RuntimeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let clients = load_clients_file(&config.clients_file)?;
    let filters = clients.filters();
    tracing::info!(
        clients = clients.clients.len(),
        auth_filters = filters.len(),
        path = %config.clients_file.display(),
        "Loaded OIDC client configuration"
    );

    let transport = Arc::new(ReqwestTransport::new(config.http_timeout)?);
    let authenticator = AccessTokenAuthenticator::new(
        Arc::new(ClientRegistry::new(clients.clients, filters)),
        Arc::new(ResultCache::new(config.cache_capacity)),
        TokenValidator::new(transport),
    );
    let app = api::router(AppState::new(authenticator));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "OIDC relying party listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.log_format);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
