use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use thiserror::Error;

/// Why a session token was not accepted.
///
/// These never leave the gateway as errors: any of them simply means the
/// caller is unauthenticated and gets sent to the identity provider.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("expected 3 dot-separated segments, found {0}")]
    Malformed(usize),
    #[error("payload is not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("payload is not a JSON claims object: {0}")]
    Claims(#[from] serde_json::Error),
    #[error("token has no exp claim")]
    MissingExpiry,
    #[error("token expired at {exp} (now {now})")]
    Expired { exp: f64, now: i64 },
    #[error("token_use is {0:?}, expected \"id\"")]
    WrongUse(Option<String>),
}

/// The subset of ID token claims the gateway looks at
#[derive(Clone, Debug, Deserialize)]
pub struct SessionClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Unix seconds. Providers occasionally emit fractional values.
    #[serde(default)]
    pub exp: Option<f64>,
    #[serde(default)]
    pub token_use: Option<String>,
}

/// Decode the payload segment without looking at the signature
pub fn decode_claims(token: &str) -> Result<SessionClaims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Malformed(segments.len()));
    }

    let payload = URL_SAFE_NO_PAD.decode(segments[1].trim_end_matches('='))?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Structural and temporal check of an ID token at time `now` (Unix seconds).
///
/// The signature is not verified here; the cookie is only ever written by
/// the gateway's own callback.
pub fn check_session_token(token: &str, now: i64) -> Result<SessionClaims, TokenError> {
    let claims = decode_claims(token)?;

    let exp = claims.exp.ok_or(TokenError::MissingExpiry)?;
    if exp <= now as f64 {
        return Err(TokenError::Expired { exp, now });
    }

    if claims.token_use.as_deref() != Some("id") {
        return Err(TokenError::WrongUse(claims.token_use));
    }

    Ok(claims)
}

/// `true` when `token` is a well-formed, unexpired ID token
pub fn is_valid_session_token(token: &str, now: i64) -> bool {
    check_session_token(token, now).is_ok()
}
