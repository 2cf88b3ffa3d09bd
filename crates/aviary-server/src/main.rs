mod config;
mod routes;
mod sweep;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use aviary_auth::{ConnectionGate, TokenValidator, ValidatorConfig};
use aviary_dispatch::Dispatcher;
use aviary_gateway::{SessionTransport, Sessions};
use aviary_registry::Registry;

use crate::config::Config;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aviary=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Shared state
    let registry = Arc::new(Registry::open(&config.db_path)?);
    let sessions = Sessions::new();
    let dispatcher = Arc::new(Dispatcher::new(
        registry.clone(),
        SessionTransport::new(sessions.clone()),
    ));
    let gate = ConnectionGate::new(TokenValidator::new(ValidatorConfig {
        issuer: config.issuer.clone(),
        audience: config.audience.clone(),
    }));

    // Stale-channel sweep
    tokio::spawn(sweep::run_sweep_loop(registry.clone(), config.stale_after));

    let state = AppState {
        gate,
        registry,
        sessions,
        dispatcher,
        feed_token: config.feed_token.clone(),
    };

    let app = Router::new()
        .route("/channels", get(routes::open_channel))
        .route("/feed", post(routes::ingest_feed))
        .route("/health", get(routes::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Aviary server listening on {}", addr);
    info!("Trusted issuer: {}", config.issuer);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
