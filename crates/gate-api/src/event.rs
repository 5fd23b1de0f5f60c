//! The request/response objects exchanged with the content-delivery network
//!
//! Headers follow the CDN layout: a map from lower-cased header name to a
//! list of `{key, value}` entries. A handler either hands the (possibly
//! modified) request back for the origin fetch, or answers with a response
//! of its own.

use std::collections::BTreeMap;

use gate_pkce::SetCookie;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::config::Environment;

/// Envelope errors, raised before any handler logic runs
#[derive(Error, Debug)]
pub enum EventError {
    #[error("invalid_event: {0}")]
    InvalidEvent(String),
    #[error("invalid_cf_record: {0}")]
    InvalidCfRecord(String),
    #[error("failed to serialize handler output: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: String,
}

/// Header map keyed by lower-cased name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeHeaders(BTreeMap<String, Vec<HeaderEntry>>);

impl EdgeHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every value recorded under `name`
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .get(&name.to_ascii_lowercase())
            .into_iter()
            .flatten()
            .map(|entry| entry.value.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    /// Replace any existing values for `key`
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(
            key.to_ascii_lowercase(),
            vec![HeaderEntry {
                key: Some(key.to_string()),
                value: value.into(),
            }],
        );
    }

    /// Add a value for `key`, keeping existing ones
    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        self.0
            .entry(key.to_ascii_lowercase())
            .or_default()
            .push(HeaderEntry {
                key: Some(key.to_string()),
                value: value.into(),
            });
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().flat_map(|(name, entries)| {
            entries
                .iter()
                .map(move |entry| (name.as_str(), entry.value.as_str()))
        })
    }
}

/// One viewer request as delivered by the CDN
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(default = "default_method")]
    pub method: String,
    pub uri: String,
    #[serde(default)]
    pub querystring: String,
    #[serde(default)]
    pub headers: EdgeHeaders,
}

fn default_method() -> String {
    "GET".to_string()
}

impl EdgeRequest {
    /// A bare GET request, mostly useful for tests and adapters
    pub fn get(uri: impl Into<String>, querystring: impl Into<String>) -> Self {
        Self {
            client_ip: None,
            method: default_method(),
            uri: uri.into(),
            querystring: querystring.into(),
            headers: EdgeHeaders::new(),
        }
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }

    /// Every `cookie` header value on the request
    pub fn cookie_headers(&self) -> impl Iterator<Item = &str> {
        self.headers.get_all("cookie")
    }
}

/// A response generated at the edge instead of fetching the origin
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeResponse {
    #[serde(serialize_with = "status_as_string", deserialize_with = "status_from_any")]
    pub status: u16,
    pub status_description: String,
    #[serde(default)]
    pub headers: EdgeHeaders,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl EdgeResponse {
    pub fn new(status: u16, status_description: impl Into<String>) -> Self {
        Self {
            status,
            status_description: status_description.into(),
            headers: EdgeHeaders::new(),
            body: None,
        }
    }

    /// `302 Found` to `location`
    pub fn redirect(location: impl Into<String>) -> Self {
        let mut response = Self::new(302, "Found");
        response.headers.insert("Location", location);
        response
    }

    /// An HTML document with the given status
    pub fn html(status: u16, status_description: impl Into<String>, body: String) -> Self {
        let mut response = Self::new(status, status_description);
        response
            .headers
            .insert("Content-Type", "text/html; charset=utf-8");
        response.body = Some(body);
        response
    }

    pub fn with_cookie(mut self, cookie: &SetCookie) -> Self {
        self.headers.append("Set-Cookie", cookie.to_string());
        self
    }

    /// Keep browsers and intermediate caches from storing this response
    pub fn no_cache(mut self) -> Self {
        self.headers
            .insert("Cache-Control", "no-cache, no-store, must-revalidate");
        self.headers.insert("Pragma", "no-cache");
        self.headers.insert("Expires", "0");
        self
    }

    /// Headers every edge-generated response carries
    pub fn with_security_headers(mut self, environment: Environment) -> Self {
        self.headers.insert("X-Content-Type-Options", "nosniff");
        self.headers.insert("X-Frame-Options", "DENY");
        self.headers
            .insert("Referrer-Policy", "strict-origin-when-cross-origin");
        if environment.is_production() {
            self.headers.insert(
                "Strict-Transport-Security",
                "max-age=31536000; includeSubDomains",
            );
        }
        self
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get("location")
    }

    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers.get_all("set-cookie")
    }
}

fn status_as_string<S: Serializer>(status: &u16, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&status.to_string())
}

fn status_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Status {
        Number(u16),
        Text(String),
    }

    match Status::deserialize(deserializer)? {
        Status::Number(status) => Ok(status),
        Status::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// What a handler hands back to the CDN
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HandlerOutput {
    /// Continue to the origin with this request
    Forward(EdgeRequest),
    /// Answer the viewer directly
    Respond(EdgeResponse),
}

impl HandlerOutput {
    pub const fn as_request(&self) -> Option<&EdgeRequest> {
        match self {
            Self::Forward(request) => Some(request),
            Self::Respond(_) => None,
        }
    }

    pub const fn as_response(&self) -> Option<&EdgeResponse> {
        match self {
            Self::Forward(_) => None,
            Self::Respond(response) => Some(response),
        }
    }

    pub fn to_value(&self) -> Result<Value, EventError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Pull the viewer request out of a CDN event envelope:
/// `{"Records":[{"cf":{"request":{...}}}]}`
pub fn request_from_event(event: &Value) -> Result<EdgeRequest, EventError> {
    let record = event
        .get("Records")
        .and_then(Value::as_array)
        .and_then(|records| records.first())
        .ok_or_else(|| EventError::InvalidEvent("event has no Records".to_string()))?;

    let request = record
        .get("cf")
        .and_then(|cf| cf.get("request"))
        .ok_or_else(|| EventError::InvalidCfRecord("record has no cf.request".to_string()))?;

    serde_json::from_value(request.clone())
        .map_err(|e| EventError::InvalidCfRecord(format!("malformed cf.request: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event() -> Value {
        json!({
            "Records": [{
                "cf": {
                    "config": { "eventType": "viewer-request" },
                    "request": {
                        "clientIp": "203.0.113.9",
                        "method": "GET",
                        "uri": "/callback",
                        "querystring": "code=xyz&state=s1",
                        "headers": {
                            "host": [{ "key": "Host", "value": "app.example.com" }],
                            "cookie": [
                                { "key": "Cookie", "value": "a=1" },
                                { "key": "Cookie", "value": "b=2" }
                            ]
                        }
                    }
                }
            }]
        })
    }

    #[test]
    fn test_request_from_event() {
        let request = request_from_event(&sample_event()).expect("event should parse");

        assert_eq!(request.uri, "/callback");
        assert_eq!(request.querystring, "code=xyz&state=s1");
        assert_eq!(request.client_ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(request.headers.get("Host"), Some("app.example.com"));
        assert_eq!(request.cookie_headers().collect::<Vec<_>>(), vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_missing_records_is_invalid_event() {
        assert!(matches!(
            request_from_event(&json!({})),
            Err(EventError::InvalidEvent(_))
        ));
        assert!(matches!(
            request_from_event(&json!({ "Records": [] })),
            Err(EventError::InvalidEvent(_))
        ));
    }

    #[test]
    fn test_bad_record_is_invalid_cf_record() {
        assert!(matches!(
            request_from_event(&json!({ "Records": [{ "s3": {} }] })),
            Err(EventError::InvalidCfRecord(_))
        ));
        assert!(matches!(
            request_from_event(&json!({ "Records": [{ "cf": { "request": { "uri": 7 } } }] })),
            Err(EventError::InvalidCfRecord(_))
        ));
    }

    #[test]
    fn test_response_serializes_in_cdn_shape() {
        let response = EdgeResponse::redirect("/dashboard")
            .with_cookie(&SetCookie::expired("pkce-state"))
            .no_cache();

        let value = HandlerOutput::Respond(response)
            .to_value()
            .expect("response should serialize");

        assert_eq!(value["status"], "302");
        assert_eq!(value["statusDescription"], "Found");
        assert_eq!(value["headers"]["location"][0]["key"], "Location");
        assert_eq!(value["headers"]["location"][0]["value"], "/dashboard");
        assert_eq!(value["headers"]["set-cookie"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["headers"]["pragma"][0]["value"], "no-cache");
        assert!(value.get("body").is_none());
    }

    #[test]
    fn test_response_status_accepts_number_or_string() {
        let from_text: EdgeResponse =
            serde_json::from_value(json!({ "status": "400", "statusDescription": "Bad Request" }))
                .expect("string status");
        let from_number: EdgeResponse =
            serde_json::from_value(json!({ "status": 400, "statusDescription": "Bad Request" }))
                .expect("numeric status");
        assert_eq!(from_text.status, 400);
        assert_eq!(from_number, from_text);
    }

    #[test]
    fn test_security_headers() {
        let dev = EdgeResponse::redirect("/").with_security_headers(Environment::Development);
        assert_eq!(dev.headers.get("x-frame-options"), Some("DENY"));
        assert!(dev.headers.get("strict-transport-security").is_none());

        let prod = EdgeResponse::redirect("/").with_security_headers(Environment::Production);
        assert!(prod.headers.get("strict-transport-security").is_some());
    }
}
