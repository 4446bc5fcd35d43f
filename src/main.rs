// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, net::SocketAddr};

use relational_auth_gateway::{
    api::{router, ApiDoc},
    config::{GatewayConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH},
    logging::{init_tracing, LogFormat},
    state::AppState,
    storage::{sweep_interval_for, FlowStore},
};
use tokio::net::TcpListener;
use tracing::{error, info};
use utoipa::OpenApi;

#[tokio::main]
async fn main() {
    if env::args().any(|arg| arg == "--print-openapi") {
        let doc = ApiDoc::openapi()
            .to_pretty_json()
            .expect("Failed to render OpenAPI document");
        println!("{doc}");
        return;
    }

    init_tracing(LogFormat::from_env()).expect("Failed to install tracing subscriber");

    let config_path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = match GatewayConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %config_path, error = %e, "Configuration rejected");
            std::process::exit(1);
        }
    };
    if let Err(e) = config.apply_env_overrides() {
        error!(error = %e, "Environment overrides rejected");
        std::process::exit(1);
    }

    let flows = FlowStore::open(sweep_interval_for(config.flow_ttl()));
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("Failed to parse bind address");
    let applications = config.application_configs.len();

    let state = match AppState::from_config(config, flows.clone()) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to initialize gateway");
            std::process::exit(1);
        }
    };
    let app = router(state);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    info!(%addr, applications, "Auth gateway listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
    }

    flows.close();
    info!("Auth gateway stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
