use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request, StatusCode},
};
use gate_api::{Environment, GatewayConfig, GatewaySettings, GatewayState, router};
use gate_pkce::{PkceTransaction, parse_cookie_header};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Serialize;
use tower::ServiceExt;
use url::Url;
use wiremock::MockServer;

pub const CLIENT_ID: &str = "test_client_id";
pub const REDIRECT_URI: &str = "https://app.example.com/callback";
pub const LOGOUT_URI: &str = "https://app.example.com/";

/// A gateway wired to a mock identity provider
pub struct TestGateway {
    pub provider: MockServer,
    pub state: GatewayState,
}

impl TestGateway {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start with settings adjusted by `customize`
    pub async fn start_with(customize: impl FnOnce(&mut GatewaySettings)) -> Self {
        let provider = MockServer::start().await;

        let mut settings =
            GatewaySettings::new(CLIENT_ID, provider.uri(), REDIRECT_URI, LOGOUT_URI);
        settings.environment = Environment::Development;
        settings.token_timeout_secs = 2;
        settings.origin_dir = fixtures_dir();
        customize(&mut settings);

        let config = GatewayConfig::try_from(settings).expect("valid test config");
        let state = GatewayState::new(config).expect("Failed to create test state");

        Self { provider, state }
    }

    pub fn client(&self) -> TestClient {
        TestClient::new(router::router().with_state(self.state.clone()))
    }
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/public")
}

#[derive(Serialize)]
struct TestClaims<'a> {
    sub: &'a str,
    email: &'a str,
    exp: i64,
    token_use: &'a str,
}

/// An ID token shaped like the provider's, signed with a throwaway key
pub fn id_token(sub: &str, exp: i64) -> String {
    signed_token(sub, exp, "id")
}

pub fn signed_token(sub: &str, exp: i64, token_use: &str) -> String {
    let claims = TestClaims {
        sub,
        email: "user@example.com",
        exp,
        token_use,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test_signing_secret"),
    )
    .expect("Failed to sign test token")
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Helper to make requests to the test app
pub struct TestClient {
    router: Router,
}

impl TestClient {
    pub const fn new(router: Router) -> Self {
        Self { router }
    }

    pub async fn request(&self, mut request: Request<Body>) -> TestResponse {
        let test_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080);
        request.extensions_mut().insert(ConnectInfo(test_addr));

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        TestResponse {
            status,
            body: body_bytes.to_vec(),
            headers,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");

        self.request(request).await
    }

    /// Send a GET request carrying `cookie` as the Cookie header
    pub async fn get_with_cookie(&self, uri: &str, cookie: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header("cookie", cookie)
            .body(Body::empty())
            .expect("Failed to build request");

        self.request(request).await
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
    pub headers: HeaderMap,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("Response body is not valid UTF-8")
    }

    pub fn assert_status(&self, expected: StatusCode) {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
    }

    pub fn location(&self) -> &str {
        self.headers
            .get("location")
            .and_then(|value| value.to_str().ok())
            .expect("Response has no Location header")
    }

    /// Every Set-Cookie header, in order
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all("set-cookie")
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(String::from)
            .collect()
    }

    pub fn get_cookie(&self, name: &str) -> Option<cookie::Cookie<'static>> {
        self.set_cookies()
            .into_iter()
            .filter_map(|header| cookie::Cookie::parse(header).ok())
            .find(|cookie| cookie.name() == name)
    }

    /// The `name=value` pair of the PKCE cookie, ready to send back
    pub fn pkce_cookie_pair(&self) -> String {
        let cookie = self.get_cookie("pkce-state").expect("Missing pkce-state cookie");
        format!("{}={}", cookie.name(), cookie.value())
    }

    /// The sign-in transaction stored in the PKCE cookie
    pub fn pkce_transaction(&self) -> PkceTransaction {
        let cookies = parse_cookie_header(&self.pkce_cookie_pair());
        PkceTransaction::from_cookie_value(&cookies["pkce-state"])
            .expect("PKCE cookie does not hold a transaction")
    }

    pub fn location_url(&self) -> Url {
        Url::parse(self.location()).expect("Location is not an absolute URL")
    }
}
