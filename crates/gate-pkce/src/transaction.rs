use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of random bytes behind the code verifier (256 bits)
pub const CODE_VERIFIER_BYTES: usize = 32;

/// Number of random bytes behind `state` and `nonce` (128 bits each)
pub const CORRELATION_BYTES: usize = 16;

/// One in-flight sign-in attempt.
///
/// Created when a user is sent to the identity provider, carried by the
/// browser in the PKCE cookie, and consumed exactly once by the callback.
/// The JSON form uses camelCase keys so cookies written by earlier
/// deployments of the gateway still decode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PkceTransaction {
    /// Secret half of the PKCE pair. Only ever sent to the token endpoint.
    pub code_verifier: String,
    #[serde(default)]
    pub code_challenge: String,
    /// CSRF correlation value, echoed back by the provider on callback
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_uri: Option<String>,
}

impl PkceTransaction {
    /// Generate a fresh transaction that will return the user to `original_uri`
    pub fn generate(original_uri: impl Into<String>) -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; CODE_VERIFIER_BYTES];
        rng.fill(&mut verifier_bytes[..]);
        let code_verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; CORRELATION_BYTES];
        rng.fill(&mut state_bytes[..]);

        let mut nonce_bytes = [0u8; CORRELATION_BYTES];
        rng.fill(&mut nonce_bytes[..]);

        Self {
            code_challenge: code_challenge(&code_verifier),
            code_verifier,
            state: hex::encode(state_bytes),
            nonce: hex::encode(nonce_bytes),
            original_uri: Some(original_uri.into()),
        }
    }

    /// Check the `state` returned by the provider against the stored one.
    ///
    /// A transaction without a stored state never matches, and neither does
    /// a callback that omitted the parameter.
    pub fn matches_state(&self, returned: Option<&str>) -> bool {
        !self.state.is_empty() && returned == Some(self.state.as_str())
    }

    /// Where to send the user once the tokens are in place
    pub fn redirect_target(&self) -> &str {
        match self.original_uri.as_deref() {
            Some(uri) if !uri.is_empty() => uri,
            _ => "/",
        }
    }

    /// Serialize for storage in the PKCE cookie
    pub fn to_cookie_value(&self) -> String {
        let mut value = serde_json::json!({
            "codeVerifier": self.code_verifier,
            "codeChallenge": self.code_challenge,
            "state": self.state,
            "nonce": self.nonce,
        });
        if let Some(uri) = &self.original_uri {
            value["originalUri"] = serde_json::Value::String(uri.clone());
        }
        value.to_string()
    }

    /// Decode the (already URL-decoded) PKCE cookie value
    pub fn from_cookie_value(value: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(value)
    }
}

/// S256 challenge: `BASE64URL(SHA256(verifier))`
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
