//! Server initialization
//!
//! Builds the router and runs the HTTP listener until shutdown.

use anyhow::{Context, Result};
use axum::{routing::get, Extension, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use webshell_core::{CommandExecutor, SessionConfig};

use super::config::AppConfig;
use super::shutdown::shutdown_on_signal;
use super::validation::validate_config;
use crate::websocket;

/// Response body of `GET /`
pub const ROOT_MESSAGE: &str = "Websocket server is running!";

/// State shared by every connection
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<CommandExecutor>,
    pub session: SessionConfig,
    /// Parent of every session token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: &AppConfig, shutdown: CancellationToken) -> Self {
        Self {
            executor: Arc::new(CommandExecutor::new(config.exec.clone())),
            session: config.session.clone(),
            shutdown,
        }
    }
}

/// HTTP routes: status text at `/`, shell sessions at `/ws`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { ROOT_MESSAGE }))
        .route("/ws", get(websocket::shell_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run the server
pub async fn run(config: AppConfig) -> Result<()> {
    validate_config(&config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        policy = ?config.exec.policy,
        output_mode = ?config.exec.output_mode,
        timeout_secs = config.exec.timeout_secs,
        "Starting webshell"
    );

    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .context("Invalid server address")?;

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("HTTP server listening on http://{}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    serve(listener, AppState::new(&config, shutdown)).await?;

    info!("webshell shutdown complete");
    Ok(())
}

/// Serve `listener` until `state.shutdown` is cancelled
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server error")
}
