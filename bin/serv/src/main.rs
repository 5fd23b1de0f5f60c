use std::net::SocketAddr;

use axum::{Router, middleware, routing::get};
use gate_api::{GatewayConfig, GatewayState};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment variables
    dotenvy::dotenv().ok();
    let config = GatewayConfig::from_env()?;

    gate_api::tracing::init_tracing(&config.environment);

    let metrics_handle = gate_api::metrics::init_metrics()?;
    tracing::info!("Prometheus metrics exporter initialized");

    let listen_addr = config.listen_addr;
    let environment = config.environment;
    let origin_dir = config.origin_dir.clone();
    let state = GatewayState::new(config)?;

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let metrics_app = Router::new()
        .route("/metrics", get(gate_api::metrics::metrics_handler))
        .with_state(metrics_handle);

    let app = gate_api::router::router()
        .merge(metrics_app)
        .with_state(state)
        .layer(trace_layer)
        .layer(middleware::from_fn(gate_api::metrics::track_metrics))
        .layer(middleware::from_fn(
            gate_api::request_id::request_id_middleware,
        ));

    tracing::info!(?environment, origin = %origin_dir.display(), "Gateway configured");

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("Gateway listening on http://{listen_addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
