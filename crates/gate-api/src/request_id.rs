//! Request ids for correlating gateway logs with origin logs.
//!
//! An id supplied by the viewer or an upstream proxy is kept; otherwise a
//! fresh UUID is added to the request before any handler sees it, so a
//! forwarded request carries the same id the gateway logged.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = match req.headers().get(&REQUEST_ID_HEADER) {
        Some(existing) => existing.clone(),
        None => {
            let generated = HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
            req.headers_mut()
                .insert(REQUEST_ID_HEADER, generated.clone());
            generated
        }
    };

    let span = tracing::info_span!(
        "request",
        request_id = request_id.to_str().unwrap_or("-"),
        method = %req.method(),
        path = req.uri().path(),
    );

    let mut response = next.run(req).instrument(span).await;
    response
        .headers_mut()
        .insert(REQUEST_ID_HEADER, request_id);
    response
}
