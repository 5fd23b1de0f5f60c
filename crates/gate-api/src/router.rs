//! Hosts the edge handlers behind a plain HTTP server.
//!
//! Every request is translated into the CDN request shape, run through the
//! handler its path selects, and then either answered directly or served
//! from the origin directory.

use std::net::SocketAddr;

use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue, StatusCode, Uri, request::Parts},
    response::{IntoResponse, Response},
    routing::get,
};
use gate_pkce::query::join_path_and_query;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::event::{EdgeHeaders, EdgeRequest, EdgeResponse, HandlerOutput};
use crate::handlers::{Handler, dispatch};
use crate::state::GatewayState;

pub fn router() -> Router<GatewayState> {
    Router::new()
        .route("/health", get(health))
        .fallback(edge)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn edge(State(state): State<GatewayState>, request: Request) -> Response {
    let (mut parts, body) = request.into_parts();
    let handler = Handler::for_path(parts.uri.path());
    let edge_request = edge_request_from_parts(&parts);

    tracing::debug!(handler = handler.name(), uri = %edge_request.uri, "Dispatching");

    match dispatch(handler, &state, edge_request).await {
        HandlerOutput::Respond(response) => into_http_response(response),
        HandlerOutput::Forward(forwarded) => {
            let target = join_path_and_query(&forwarded.uri, &forwarded.querystring);
            match target.parse::<Uri>() {
                Ok(uri) => parts.uri = uri,
                Err(err) => {
                    tracing::warn!(%target, error = %err, "Handler produced an invalid URI");
                    return StatusCode::BAD_REQUEST.into_response();
                }
            }
            serve_origin(&state, Request::from_parts(parts, body)).await
        }
    }
}

/// The CDN view of an incoming HTTP request. Non-UTF-8 header values are dropped.
fn edge_request_from_parts(parts: &Parts) -> EdgeRequest {
    let mut headers = EdgeHeaders::new();
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            headers.append(name.as_str(), value);
        }
    }

    EdgeRequest {
        client_ip: parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string()),
        method: parts.method.to_string(),
        uri: parts.uri.path().to_string(),
        querystring: parts.uri.query().unwrap_or_default().to_string(),
        headers,
    }
}

fn into_http_response(edge: EdgeResponse) -> Response {
    let status = StatusCode::from_u16(edge.status).unwrap_or_else(|_| {
        tracing::warn!(status = edge.status, "Invalid status from handler");
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut response = Response::new(Body::from(edge.body.unwrap_or_default()));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in edge.headers.iter() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::warn!(header = name, "Dropping invalid response header"),
        }
    }

    response
}

async fn serve_origin(state: &GatewayState, request: Request) -> Response {
    match ServeDir::new(&state.config.origin_dir).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(err) => match err {},
    }
}
