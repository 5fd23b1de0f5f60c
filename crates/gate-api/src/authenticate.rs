use gate_pkce::cookies::PKCE_COOKIE_MAX_AGE;
use gate_pkce::{PkceTransaction, SetCookie};
use url::Url;

use crate::config::GatewayConfig;
use crate::event::EdgeResponse;

pub const SCOPES: &str = "openid email profile";

/// Start an Authorization Code + PKCE sign-in that will end at `original_uri`.
///
/// Shared by the request gate (unauthenticated traffic) and `/signin`. The
/// returned response is a 302 to the provider's authorize endpoint carrying
/// the serialized transaction in the PKCE cookie.
pub fn begin_authentication(
    config: &GatewayConfig,
    original_uri: &str,
) -> (PkceTransaction, EdgeResponse) {
    let transaction = PkceTransaction::generate(original_uri);

    let pkce_cookie = SetCookie::new(
        &config.cookie_names.pkce_state,
        transaction.to_cookie_value(),
        PKCE_COOKIE_MAX_AGE,
    );

    let response = EdgeResponse::redirect(authorize_url(config, &transaction))
        .with_cookie(&pkce_cookie)
        .no_cache()
        .with_security_headers(config.environment);

    (transaction, response)
}

/// The provider authorize URL for `transaction`
pub fn authorize_url(config: &GatewayConfig, transaction: &PkceTransaction) -> String {
    let mut url: Url = config.authorize_endpoint().clone();
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("scope", SCOPES)
        .append_pair("state", &transaction.state)
        .append_pair("nonce", &transaction.nonce)
        .append_pair("code_challenge", &transaction.code_challenge)
        .append_pair("code_challenge_method", "S256");
    url.into()
}
