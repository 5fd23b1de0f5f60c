use std::collections::HashMap;
use std::fmt;

use cookie::Cookie;
use time::Duration;

/// Lifetime of the PKCE cookie: long enough to finish a sign-in
pub const PKCE_COOKIE_MAX_AGE: Duration = Duration::minutes(10);

/// Refresh tokens outlive the ID/access tokens regardless of `expires_in`
pub const REFRESH_COOKIE_MAX_AGE: Duration = Duration::days(7);

/// Lifetime used when the token endpoint omits `expires_in`
pub const DEFAULT_TOKEN_MAX_AGE: Duration = Duration::hours(1);

/// Names of the five cookies that make up a session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieNames {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub nonce: String,
    pub pkce_state: String,
}

impl Default for CookieNames {
    fn default() -> Self {
        Self {
            id_token: "id-token".to_string(),
            access_token: "access-token".to_string(),
            refresh_token: "refresh-token".to_string(),
            nonce: "nonce".to_string(),
            pkce_state: "pkce-state".to_string(),
        }
    }
}

impl CookieNames {
    /// Every session cookie, in the order sign-out clears them
    pub fn all(&self) -> [&str; 5] {
        [
            self.id_token.as_str(),
            self.access_token.as_str(),
            self.refresh_token.as_str(),
            self.nonce.as_str(),
            self.pkce_state.as_str(),
        ]
    }
}

/// Parse a `cookie` header into name/value pairs.
///
/// Segments are split on `;`, then on the first `=`. Values are
/// percent-decoded. Segments without a name, without `=`, or whose value
/// does not decode are skipped. A later duplicate overwrites an earlier one.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    parse_cookie_headers([header])
}

/// Same as [`parse_cookie_header`] for requests carrying several `cookie` headers
pub fn parse_cookie_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> HashMap<String, String> {
    headers
        .into_iter()
        .flat_map(Cookie::split_parse_encoded)
        .filter_map(Result::ok)
        .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
        .collect()
}

/// A `Set-Cookie` value in the gateway's fixed attribute layout:
///
/// `name=value; Path=/; Secure; HttpOnly; SameSite=Lax; Max-Age=<seconds>`
///
/// The value is percent-encoded so JSON payloads survive the round trip
/// through [`parse_cookie_header`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetCookie {
    name: String,
    value: String,
    max_age: Duration,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, max_age: Duration) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age,
        }
    }

    /// An empty cookie with `Max-Age=0`, telling the browser to drop it
    pub fn expired(name: impl Into<String>) -> Self {
        Self::new(name, String::new(), Duration::ZERO)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub const fn max_age(&self) -> Duration {
        self.max_age
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Path=/; Secure; HttpOnly; SameSite=Lax; Max-Age={}",
            self.name,
            urlencoding::encode(&self.value),
            self.max_age.whole_seconds().max(0)
        )
    }
}
