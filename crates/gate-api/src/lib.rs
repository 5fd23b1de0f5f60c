//! Edge authentication gateway.
//!
//! Four stateless handlers put an OAuth2 Authorization Code + PKCE sign-in in
//! front of a static single-page app: the request gate, `/signin`,
//! `/callback` and `/signout`. They speak the CDN's request/response event
//! shape ([`event`]) and can run either as edge functions ([`handlers::invoke`])
//! or behind the bundled HTTP server ([`router`]).

pub mod authenticate;
pub mod config;
pub mod error;
pub mod event;
pub mod handlers;
pub mod metrics;
pub mod provider;
pub mod request_id;
pub mod router;
pub mod state;
pub mod tracing;

pub use config::{Environment, GatewayConfig, GatewaySettings};
pub use state::GatewayState;
