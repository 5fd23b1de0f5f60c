//! `/signout`: drop every session cookie and end the provider session

use gate_pkce::{SetCookie, parse_query_string};
use url::Url;

use crate::config::GatewayConfig;
use crate::event::{EdgeRequest, EdgeResponse, HandlerOutput};
use crate::metrics;

/// `?redirect=` overrides the configured logout URI as the post-logout
/// landing page. It is passed to the provider as-is.
pub fn handle(config: &GatewayConfig, request: &EdgeRequest) -> HandlerOutput {
    let query = parse_query_string(&request.querystring);
    let target = query
        .get("redirect")
        .filter(|target| !target.is_empty())
        .unwrap_or(&config.logout_uri);

    let response = config
        .cookie_names
        .all()
        .into_iter()
        .fold(
            EdgeResponse::redirect(logout_url(config, target)),
            |response, name| response.with_cookie(&SetCookie::expired(name)),
        )
        .no_cache()
        .with_security_headers(config.environment);

    tracing::info!(redirect = %target, "Signing out");
    metrics::record_signout();

    HandlerOutput::Respond(response)
}

fn logout_url(config: &GatewayConfig, target: &str) -> String {
    let mut url: Url = config.logout_endpoint().clone();
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("logout_uri", target)
        .append_pair("redirect_uri", target);
    url.into()
}
