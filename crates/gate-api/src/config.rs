use std::collections::HashSet;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use axum::http::uri::PathAndQuery;
use gate_pkce::CookieNames;
use serde::Deserialize;
use thiserror::Error;
use url::Url;
use validator::Validate;

/// Prefix shared by every environment variable the gateway reads
pub const ENV_PREFIX: &str = "EDGE_AUTH_";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub const fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
    #[error("Invalid URL for {field}: {source}")]
    Url {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("Invalid listen address: {0}")]
    ListenAddr(#[from] AddrParseError),
    #[error("{field} must be an absolute path starting with '/', got {value:?}")]
    InvalidPath { field: &'static str, value: String },
    #[error("Cookie names cannot be empty")]
    EmptyCookieName,
    #[error("Cookie name {0:?} is assigned to more than one session cookie")]
    DuplicateCookieName(String),
}

/// Raw settings as supplied by the deployment, before validation.
///
/// Read from `EDGE_AUTH_*` environment variables; list values such as
/// `EDGE_AUTH_PUBLIC_PATHS` are comma separated.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct GatewaySettings {
    #[validate(length(min = 1))]
    pub client_id: String,
    /// Identity provider base URL, e.g. `https://auth.example.com`
    #[validate(url)]
    pub user_pool_domain: String,
    /// This gateway's `/callback` URL as registered with the provider
    #[validate(url)]
    pub redirect_uri: String,
    #[validate(url)]
    pub logout_uri: String,
    #[serde(default)]
    pub environment: Environment,

    #[serde(default = "default_spa_index")]
    pub spa_index: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,

    pub cookie_id_token: Option<String>,
    pub cookie_access_token: Option<String>,
    pub cookie_refresh_token: Option<String>,
    pub cookie_nonce: Option<String>,
    pub cookie_pkce_state: Option<String>,

    #[serde(default = "default_token_timeout_secs")]
    pub token_timeout_secs: u64,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_origin_dir")]
    pub origin_dir: PathBuf,
}

fn default_spa_index() -> String {
    "/index.html".to_string()
}

fn default_api_prefix() -> String {
    "/api/".to_string()
}

fn default_public_paths() -> Vec<String> {
    [
        "/signin",
        "/callback",
        "/signout",
        "/favicon.ico",
        "/robots.txt",
        "/.well-known/",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

const fn default_token_timeout_secs() -> u64 {
    5
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_origin_dir() -> PathBuf {
    PathBuf::from("public")
}

impl GatewaySettings {
    /// Settings for one identity provider client with every optional value defaulted
    pub fn new(
        client_id: impl Into<String>,
        user_pool_domain: impl Into<String>,
        redirect_uri: impl Into<String>,
        logout_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            user_pool_domain: user_pool_domain.into(),
            redirect_uri: redirect_uri.into(),
            logout_uri: logout_uri.into(),
            environment: Environment::default(),
            spa_index: default_spa_index(),
            api_prefix: default_api_prefix(),
            public_paths: default_public_paths(),
            cookie_id_token: None,
            cookie_access_token: None,
            cookie_refresh_token: None,
            cookie_nonce: None,
            cookie_pkce_state: None,
            token_timeout_secs: default_token_timeout_secs(),
            listen_addr: default_listen_addr(),
            origin_dir: default_origin_dir(),
        }
    }

    fn cookie_names(&self) -> Result<CookieNames, ConfigError> {
        let defaults = CookieNames::default();
        let pick = |custom: &Option<String>, default: String| {
            custom.as_ref().map(|name| name.trim().to_string()).unwrap_or(default)
        };

        let names = CookieNames {
            id_token: pick(&self.cookie_id_token, defaults.id_token),
            access_token: pick(&self.cookie_access_token, defaults.access_token),
            refresh_token: pick(&self.cookie_refresh_token, defaults.refresh_token),
            nonce: pick(&self.cookie_nonce, defaults.nonce),
            pkce_state: pick(&self.cookie_pkce_state, defaults.pkce_state),
        };

        let mut seen = HashSet::new();
        for name in names.all() {
            if name.is_empty() {
                return Err(ConfigError::EmptyCookieName);
            }
            if !seen.insert(name) {
                return Err(ConfigError::DuplicateCookieName(name.to_string()));
            }
        }

        Ok(names)
    }
}

/// Validated gateway configuration, built once at start-up and shared
/// read-only by every handler invocation.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub logout_uri: String,
    pub environment: Environment,
    pub cookie_names: CookieNames,
    pub spa_index: String,
    pub api_prefix: String,
    pub public_paths: Vec<String>,
    pub token_timeout: Duration,
    pub listen_addr: SocketAddr,
    pub origin_dir: PathBuf,
    authorize_endpoint: Url,
    token_endpoint: Url,
    logout_endpoint: Url,
}

impl GatewayConfig {
    /// Load `.env`-style settings from the process environment and validate them
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = envy::prefixed(ENV_PREFIX).from_env::<GatewaySettings>()?;
        Self::try_from(settings)
    }

    /// `{domain}/oauth2/authorize`
    pub const fn authorize_endpoint(&self) -> &Url {
        &self.authorize_endpoint
    }

    /// `{domain}/oauth2/token`
    pub const fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }

    /// `{domain}/logout`
    pub const fn logout_endpoint(&self) -> &Url {
        &self.logout_endpoint
    }

    /// Whether `path` skips authentication entirely.
    ///
    /// Entries ending in `/` match as prefixes, all others exactly.
    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_paths.iter().any(|entry| {
            if entry.ends_with('/') {
                path.starts_with(entry.as_str())
            } else {
                path == entry
            }
        })
    }

    /// Whether `path` targets the origin's API rather than the single-page app
    pub fn is_api_path(&self, path: &str) -> bool {
        let prefix = self.api_prefix.trim_end_matches('/');
        path == prefix || path.starts_with(&self.api_prefix)
    }
}

/// A path on the origin: non-empty, starting with `/`, no query, and usable
/// as a request URI
fn origin_path(field: &'static str, value: &str) -> Result<String, ConfigError> {
    let path = value.trim();
    let usable = path
        .parse::<PathAndQuery>()
        .is_ok_and(|parsed| path.starts_with('/') && parsed.query().is_none());
    if usable {
        Ok(path.to_string())
    } else {
        Err(ConfigError::InvalidPath {
            field,
            value: value.to_string(),
        })
    }
}

impl TryFrom<GatewaySettings> for GatewayConfig {
    type Error = ConfigError;

    fn try_from(settings: GatewaySettings) -> Result<Self, Self::Error> {
        settings.validate()?;

        let cookie_names = settings.cookie_names()?;
        let spa_index = origin_path("spa_index", &settings.spa_index)?;
        let api_prefix = origin_path("api_prefix", &settings.api_prefix)?;
        if api_prefix == "/" {
            return Err(ConfigError::InvalidPath {
                field: "api_prefix",
                value: api_prefix,
            });
        }

        let domain = settings.user_pool_domain.trim_end_matches('/');
        let endpoint = |field: &'static str, path: &str| {
            Url::parse(&format!("{domain}{path}")).map_err(|source| ConfigError::Url { field, source })
        };

        let authorize_endpoint = endpoint("user_pool_domain", "/oauth2/authorize")?;
        let token_endpoint = endpoint("user_pool_domain", "/oauth2/token")?;
        let logout_endpoint = endpoint("user_pool_domain", "/logout")?;

        let public_paths = settings
            .public_paths
            .iter()
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty())
            .collect();

        Ok(Self {
            client_id: settings.client_id,
            redirect_uri: settings.redirect_uri,
            logout_uri: settings.logout_uri,
            environment: settings.environment,
            cookie_names,
            spa_index,
            api_prefix,
            public_paths,
            token_timeout: Duration::from_secs(settings.token_timeout_secs),
            listen_addr: settings.listen_addr.parse()?,
            origin_dir: settings.origin_dir,
            authorize_endpoint,
            token_endpoint,
            logout_endpoint,
        })
    }
}
