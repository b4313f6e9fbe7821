//! Canva OAuth relay
//!
//! Single-binary service that:
//! 1. Runs the Authorization Code + PKCE flow against Canva for a browser
//! 2. Keeps one access token per user in a flat JSON store
//! 3. Proxies profile, folder and asset upload calls with the stored token

mod app;
mod config;
mod error;
mod metrics;
mod oauth;
mod resources;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use canva_api::CanvaClient;
use canva_auth::CredentialStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::{AppState, RouterOptions, build_router, cookie_key};
use crate::config::Config;

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    // JSON logs, LOG_LEVEL then RUST_LOG
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting canva-relay");

    // Install before any metric is emitted
    let prometheus = metrics::install_recorder().context("failed to install metrics recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loading configuration"),
        None => info!("no config file, using environment and defaults"),
    }
    let config = Config::load(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("failed to load config from {}", path.display()),
        None => "failed to load config from environment".to_string(),
    })?;

    info!(
        profile = config.profile.as_str(),
        listen_addr = %config.server.listen_addr,
        frontend_origin = %config.frontend_origin,
        redirect_uri = %config.redirect_uri,
        store = %config.store.path.display(),
        "configuration loaded"
    );

    let store = CredentialStore::load(config.store.path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to load credential store {}",
                config.store.path.display()
            )
        })?;
    info!(
        path = %store.path().display(),
        users = store.len().await,
        "credential store ready"
    );

    let http = reqwest::Client::builder()
        .timeout(config.canva.timeout)
        .build()
        .context("failed to build HTTP client")?;
    let api = CanvaClient::new(http.clone(), &config.canva.api_base_url, config.canva.timeout)
        .context("invalid Canva API base URL")?;

    let frontend_origin = HeaderValue::from_str(&config.frontend_origin)
        .with_context(|| format!("invalid frontend origin {}", config.frontend_origin))?;

    let shutdown = CancellationToken::new();
    let state = AppState {
        store: Arc::new(store),
        oauth: Arc::new(config.oauth_settings()),
        api,
        http,
        cookie_key: cookie_key(config.cookie_secret.expose()),
        profile: config.profile,
        poll_policy: Arc::new(config.poll_policy()),
        shutdown: shutdown.clone(),
        prometheus,
        started_at: Instant::now(),
    };

    let app = build_router(
        state,
        &RouterOptions {
            frontend_origin,
            max_connections: config.server.max_connections,
            max_upload_bytes: config.server.max_upload_bytes,
        },
    );

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the signal fires, not when the server
    // starts: the server is told to drain, then raced against the timer.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;

    // Stop upload polls first so their handlers can answer and drain
    shutdown.cancel();
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
