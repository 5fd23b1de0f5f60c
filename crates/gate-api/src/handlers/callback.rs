//! `/callback`: finish the sign-in the provider just redirected back from
//!
//! The checks run in a fixed order and the first failure ends the request
//! with an error page:
//!
//! 1. the event envelope is well formed
//! 2. the provider did not report an `error`
//! 3. a `code` is present
//! 4. the PKCE cookie is present
//! 5. the PKCE cookie decodes
//! 6. the returned `state` matches the stored one
//! 7. the token endpoint accepts the code and verifier
//!
//! Only then are the session cookies written and the PKCE cookie cleared.

use gate_pkce::cookies::{REFRESH_COOKIE_MAX_AGE, parse_cookie_headers};
use gate_pkce::token::decode_claims;
use gate_pkce::{PkceTransaction, SetCookie, parse_query_string};
use serde_json::Value;

use crate::error::CallbackError;
use crate::event::{EdgeRequest, EdgeResponse, request_from_event};
use crate::metrics;
use crate::state::GatewayState;

/// Entry point for platforms that hand over the raw CDN event
pub async fn handle_event(state: &GatewayState, event: &Value) -> EdgeResponse {
    match request_from_event(event) {
        Ok(request) => handle(state, &request).await,
        Err(err) => reject(state, CallbackError::from(err)),
    }
}

pub async fn handle(state: &GatewayState, request: &EdgeRequest) -> EdgeResponse {
    match complete_sign_in(state, request).await {
        Ok(response) => {
            metrics::record_callback_outcome("success");
            response
        }
        Err(err) => reject(state, err),
    }
}

fn reject(state: &GatewayState, err: CallbackError) -> EdgeResponse {
    tracing::warn!(kind = err.kind(), error = %err, "Callback rejected");
    metrics::record_callback_outcome(err.outcome());
    err.to_response()
        .with_security_headers(state.config.environment)
}

async fn complete_sign_in(
    state: &GatewayState,
    request: &EdgeRequest,
) -> Result<EdgeResponse, CallbackError> {
    let config = &state.config;
    let query = parse_query_string(&request.querystring);

    if let Some(code) = query.get("error").filter(|code| !code.is_empty()) {
        return Err(CallbackError::OAuth {
            code: code.clone(),
            description: query.get("error_description").cloned(),
        });
    }

    let code = query
        .get("code")
        .filter(|code| !code.is_empty())
        .ok_or(CallbackError::MissingCode)?;

    let cookies = parse_cookie_headers(request.cookie_headers());
    let stored = cookies
        .get(&config.cookie_names.pkce_state)
        .filter(|value| !value.is_empty())
        .ok_or(CallbackError::MissingPkce)?;

    let transaction =
        PkceTransaction::from_cookie_value(stored).map_err(CallbackError::InvalidPkce)?;

    if !transaction.matches_state(query.get("state").map(String::as_str)) {
        return Err(CallbackError::StateMismatch);
    }

    let tokens = state
        .tokens
        .exchange_code(code, &transaction.code_verifier)
        .await?;

    let names = &config.cookie_names;
    let lifetime = tokens.lifetime();

    let mut response = EdgeResponse::redirect(transaction.redirect_target())
        .with_cookie(&SetCookie::new(&names.id_token, &tokens.id_token, lifetime))
        .with_cookie(&SetCookie::new(&names.access_token, &tokens.access_token, lifetime));

    if let Some(refresh_token) = &tokens.refresh_token {
        response = response.with_cookie(&SetCookie::new(
            &names.refresh_token,
            refresh_token,
            REFRESH_COOKIE_MAX_AGE,
        ));
    }

    let response = response
        .with_cookie(&SetCookie::expired(&names.pkce_state))
        .no_cache()
        .with_security_headers(config.environment);

    let subject = decode_claims(&tokens.id_token).ok().and_then(|claims| claims.sub);
    tracing::info!(
        sub = subject.as_deref().unwrap_or("-"),
        redirect = %transaction.redirect_target(),
        expires_in = lifetime.whole_seconds(),
        "Sign-in completed"
    );

    Ok(response)
}
