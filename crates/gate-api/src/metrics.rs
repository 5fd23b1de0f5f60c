//! Prometheus metrics for gate decisions, sign-in outcomes and HTTP traffic.

use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::handlers::Handler;

const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full("token_exchange_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )?
        .install_recorder()?;

    Ok(handle)
}

/// Middleware to record HTTP request metrics
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = route_label(req.uri().path());

    let in_flight = gauge!("http_requests_in_flight", "method" => method.clone());
    in_flight.increment(1.0);

    let response = next.run(req).await;

    in_flight.decrement(1.0);

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.clone()
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path,
        "status" => status
    )
    .record(duration);

    response
}

/// Label for the `path` dimension. Every request not aimed at a fixed
/// endpoint lands in the gate, so viewer-chosen paths collapse to the handler
/// name and the label set stays closed.
fn route_label(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => Handler::for_path(path).name(),
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (StatusCode::OK, handle.render())
}

/// `public`, `allow` or `redirect`
pub fn record_gate_decision(decision: &'static str) {
    counter!("gate_decisions_total", "decision" => decision).increment(1);
}

pub fn record_signin() {
    counter!("signin_total").increment(1);
}

/// `success`, or the error kind that ended the callback
pub fn record_callback_outcome(outcome: &'static str) {
    counter!("callback_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_signout() {
    counter!("signout_total").increment(1);
}

pub fn record_token_exchange(duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!("token_exchanges_total", "status" => status).increment(1);
    histogram!("token_exchange_duration_seconds", "status" => status).record(duration_secs);
}
