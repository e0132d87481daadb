//! Application entry point and server initialization
//!
//! Loads configuration, opens the database, and serves the router with
//! graceful shutdown support.

use std::process;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use short_url::config::Config;
use short_url::database::Store;
use short_url::route::create_app;
use short_url::state::AppState;
use short_url::token::TokenService;

/// Application entry point
///
/// Missing or invalid configuration (see [`Config`]) and an unopenable
/// database stop the process before it binds a port.
#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("short_url=debug,tower_http=debug")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            process::exit(1);
        }
    };

    let store = match Store::open(&config.database_url) {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, path = %config.database_url, "failed to open database");
            process::exit(1);
        }
    };

    let tokens =
        TokenService::with_windows(&config.jwt_secret, config.token_ttl, config.refresh_threshold);
    let state = AppState::new(store, tokens, &config.base_url);
    let app = create_app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "failed to bind");
            process::exit(1);
        }
    };

    tracing::info!(port = config.port, database = %config.database_url, "server running");

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %err, "server stopped with an error");
        process::exit(1);
    }
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM
///
/// In-flight requests are allowed to complete and open database
/// transactions are closed before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, stopping server");
}
