//! Client for the identity provider's token endpoint

use std::time::Instant;

use gate_pkce::cookies::DEFAULT_TOKEN_MAX_AGE;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::GatewayConfig;
use crate::metrics;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("request to token endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("token endpoint returned an unreadable body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Successful token endpoint response
#[derive(Clone, Deserialize)]
pub struct TokenSet {
    pub id_token: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the ID and access tokens expire
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("id_token", &"[redacted]")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

impl TokenSet {
    /// Cookie lifetime for the ID and access tokens.
    ///
    /// Falls back to one hour when `expires_in` is missing or not positive.
    pub fn lifetime(&self) -> time::Duration {
        match self.expires_in {
            Some(seconds) if seconds > 0 => time::Duration::seconds(seconds),
            _ => DEFAULT_TOKEN_MAX_AGE,
        }
    }
}

/// Exchanges authorization codes at `{domain}/oauth2/token`.
///
/// One POST per callback, no retries. The HTTP client carries the configured
/// timeout so a stalled provider fails the callback instead of hanging it.
#[derive(Clone, Debug)]
pub struct TokenClient {
    http: reqwest::Client,
    endpoint: Url,
    client_id: String,
    redirect_uri: String,
}

impl TokenClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.token_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.token_endpoint().clone(),
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    /// Trade `code` and the PKCE verifier for a token set
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, ExchangeError> {
        let started = Instant::now();
        let result = self.request_tokens(code, code_verifier).await;
        metrics::record_token_exchange(started.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    async fn request_tokens(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, ExchangeError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .http
            .post(self.endpoint.clone())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lifetime_follows_expires_in() {
        let tokens: TokenSet = serde_json::from_value(json!({
            "id_token": "t1",
            "access_token": "t2",
            "expires_in": 900
        }))
        .expect("token set");
        assert_eq!(tokens.lifetime().whole_seconds(), 900);
        assert!(tokens.refresh_token.is_none());
    }

    #[test]
    fn test_lifetime_defaults_to_an_hour() {
        let missing: TokenSet =
            serde_json::from_value(json!({ "id_token": "t1", "access_token": "t2" }))
                .expect("token set");
        assert_eq!(missing.lifetime().whole_seconds(), 3600);

        let zero: TokenSet = serde_json::from_value(json!({
            "id_token": "t1",
            "access_token": "t2",
            "expires_in": 0
        }))
        .expect("token set");
        assert_eq!(zero.lifetime().whole_seconds(), 3600);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let tokens: TokenSet = serde_json::from_value(json!({
            "id_token": "secret-id",
            "access_token": "secret-access",
            "refresh_token": "secret-refresh"
        }))
        .expect("token set");

        let debug = format!("{tokens:?}");
        assert!(!debug.contains("secret"));
    }
}
