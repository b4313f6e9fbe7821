//! Prometheus metrics exposition
//!
//! - `relay_requests_total` (counter): labels `route`, `status`
//! - `relay_oauth_exchanges_total` (counter): label `outcome`
//! - `relay_upload_jobs_total`, `relay_upload_polls_total` and
//!   `relay_upload_duration_seconds` are emitted by `canva_api::upload`

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Upload jobs usually finish within seconds; the top bucket matches the
/// default poll deadline.
const UPLOAD_BUCKETS: &[f64] = &[0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("relay_upload_duration_seconds".to_string()),
        UPLOAD_BUCKETS,
    )
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    Ok(builder()?.install_recorder()?)
}

/// Handle backed by a recorder that is not installed globally. Used by
/// router tests, which may build many routers in one process.
#[cfg(test)]
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

pub fn record_request(route: &str, status: u16) {
    metrics::counter!(
        "relay_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_oauth_exchange(outcome: &'static str) {
    metrics::counter!("relay_oauth_exchanges_total", "outcome" => outcome).increment(1);
}

/// Middleware counting every response by matched route template.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let response = next.run(request).await;
    record_request(&route, response.status().as_u16());
    response
}
