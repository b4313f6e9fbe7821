//! Shared state and router assembly

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRef, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum_extra::extract::cookie::Key;
use canva_api::{CanvaClient, PollPolicy};
use canva_auth::{CredentialStore, OAuthSettings};
use common::DeploymentProfile;
use metrics_exporter_prometheus::PrometheusHandle;
use sha2::{Digest, Sha512};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::{metrics, oauth, resources};

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CredentialStore>,
    pub oauth: Arc<OAuthSettings>,
    /// Connect API client for resource calls
    pub api: CanvaClient,
    /// Plain client for the token endpoint
    pub http: reqwest::Client,
    pub cookie_key: Key,
    pub profile: DeploymentProfile,
    pub poll_policy: Arc<PollPolicy>,
    /// Cancelled on shutdown; stops in-progress upload polls
    pub shutdown: CancellationToken,
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Derive the cookie signing key from the configured secret.
///
/// `Key` wants 64 bytes of material; SHA-512 stretches any secret of at least
/// 32 bytes to that length.
pub fn cookie_key(secret: &str) -> Key {
    Key::from(Sha512::digest(secret.as_bytes()).as_slice())
}

/// Router-level limits and CORS origin.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub frontend_origin: HeaderValue,
    pub max_connections: usize,
    pub max_upload_bytes: usize,
}

/// Build the axum router with all routes and shared state.
pub fn build_router(state: AppState, options: &RouterOptions) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(options.frontend_origin.clone())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/authorize", get(oauth::authorize))
        .route("/oauth/redirect", get(oauth::oauth_redirect))
        .route("/success", get(oauth::success))
        .route("/user", get(resources::user))
        .route("/folder", get(resources::folder))
        .route(
            "/upload",
            post(resources::upload).layer(DefaultBodyLimit::max(options.max_upload_bytes)),
        )
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(axum::middleware::from_fn(metrics::track_requests))
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
            tracing::info_span!(
                "request",
                request_id = %request_id,
                method = %request.method(),
                path = request.uri().path(),
            )
        }))
        .layer(tower::limit::ConcurrencyLimitLayer::new(options.max_connections))
        .with_state(state)
}

/// Liveness plus a few facts about the running instance.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "ok",
        "profile": state.profile.as_str(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "credentials": state.store.len().await,
    });
    (StatusCode::OK, axum::Json(body))
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}
