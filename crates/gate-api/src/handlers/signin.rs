//! `/signin`: explicit entry point into the sign-in flow

use gate_pkce::parse_query_string;

use crate::authenticate::begin_authentication;
use crate::config::GatewayConfig;
use crate::event::{EdgeRequest, HandlerOutput};
use crate::metrics;

/// Always starts a fresh sign-in, even for callers that already hold a
/// session. `?redirect=` chooses where to land afterwards (default `/`).
pub fn handle(config: &GatewayConfig, request: &EdgeRequest) -> HandlerOutput {
    let query = parse_query_string(&request.querystring);
    let target = query
        .get("redirect")
        .map(String::as_str)
        .filter(|target| !target.is_empty())
        .unwrap_or("/");

    let (_, response) = begin_authentication(config, target);

    tracing::info!(redirect = %target, "Sign-in requested");
    metrics::record_signin();

    HandlerOutput::Respond(response)
}
