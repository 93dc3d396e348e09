//! Startup orchestration.
//!
//! # Responsibilities
//! - Parse the command line and load configuration
//! - Initialize logging
//! - Build the server, bind the listener and serve until a signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last, once every component is built

use clap::Parser;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{self, Cli, ConfigError};
use crate::http::HttpServer;
use crate::lifecycle::{signals::shutdown_signal, Shutdown};
use crate::observability::init_logging;
use crate::routing::RouteError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("route setup failed: {0}")]
    Routes(#[from] RouteError),

    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Run the gateway from process arguments and environment.
pub async fn run() -> Result<(), StartupError> {
    let cli = Cli::parse();
    let config = config::load(&cli)?;
    init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        routes = config.routes.len(),
        window_secs = config.rate_limit.window_secs,
        max_requests = config.rate_limit.max_requests,
        upstream_timeout_secs = config.timeouts.upstream_secs,
        "Configuration loaded"
    );
    for route in &config.routes {
        tracing::info!(
            route = %route.name,
            prefix = %route.path_prefix,
            backend = %route.backend_url,
            requires_auth = route.requires_auth,
            "Route registered"
        );
    }

    let address = config.listener.bind_address();
    let server = HttpServer::new(config)?;

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address: address.clone(), source })?;
    tracing::info!(address = %address, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_task = server.run(listener, shutdown.subscribe());

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    server_task.await.map_err(StartupError::Serve)?;
    tracing::info!("Shutdown complete");
    Ok(())
}
