//! Request gate: runs in front of every request that is not routed to a
//! dedicated auth handler.

use chrono::Utc;
use gate_pkce::cookies::parse_cookie_headers;
use gate_pkce::query::{append_query_param, join_path_and_query};
use gate_pkce::token::check_session_token;

use crate::authenticate::begin_authentication;
use crate::config::GatewayConfig;
use crate::event::{EdgeRequest, HandlerOutput};
use crate::metrics;

/// Query parameter added to the post-sign-in target so no cache serves a
/// stale copy of it on the way back
pub const CACHE_BUST_PARAM: &str = "_ts";

pub fn handle(config: &GatewayConfig, request: EdgeRequest) -> HandlerOutput {
    handle_at(config, request, Utc::now().timestamp())
}

/// Gate `request` as if the current time were `now` (Unix seconds)
pub fn handle_at(config: &GatewayConfig, mut request: EdgeRequest, now: i64) -> HandlerOutput {
    if config.is_public_path(&request.uri) {
        tracing::debug!(uri = %request.uri, "Public path, skipping auth");
        metrics::record_gate_decision("public");
        return HandlerOutput::Forward(request);
    }

    let original_uri = join_path_and_query(&request.uri, &request.querystring);

    if serves_app_shell(config, &request.uri) {
        tracing::debug!(uri = %request.uri, index = %config.spa_index, "Rewriting client-side route");
        request.uri = config.spa_index.clone();
    }

    let cookies = parse_cookie_headers(request.cookie_headers());
    if let Some(token) = cookies.get(&config.cookie_names.id_token) {
        match check_session_token(token, now) {
            Ok(claims) => {
                tracing::debug!(
                    uri = %request.uri,
                    sub = claims.sub.as_deref().unwrap_or("-"),
                    "Session valid, forwarding"
                );
                metrics::record_gate_decision("allow");
                return HandlerOutput::Forward(request);
            }
            Err(reason) => {
                tracing::debug!(%reason, "Session token rejected");
            }
        }
    }

    let original_uri = append_query_param(&original_uri, CACHE_BUST_PARAM, &now.to_string());
    let (_, response) = begin_authentication(config, &original_uri);

    tracing::info!(original_uri = %original_uri, "No valid session, redirecting to identity provider");
    metrics::record_gate_decision("redirect");

    HandlerOutput::Respond(response)
}

/// Paths handled by the single-page app's client-side router: not the root,
/// not an API call, and no file extension in the last segment
fn serves_app_shell(config: &GatewayConfig, path: &str) -> bool {
    path != "/" && !config.is_api_path(path) && !has_file_extension(path)
}

fn has_file_extension(path: &str) -> bool {
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    last_segment
        .rsplit_once('.')
        .is_some_and(|(_, extension)| !extension.is_empty())
}
