//! Protocol primitives for the edge authentication gateway
//!
//! This crate holds the pieces of the OAuth2 Authorization Code + PKCE flow
//! that do not touch the network: generating the per-attempt PKCE
//! transaction, inspecting session tokens, reading the `cookie` header,
//! rendering `Set-Cookie` values and parsing query strings.
//!
//! Everything here is a pure function of its inputs (plus the system RNG for
//! fresh transactions), so handlers can rebuild the whole session from the
//! request on every invocation.

pub mod cookies;
pub mod query;
pub mod token;
pub mod transaction;

pub use cookies::{CookieNames, SetCookie, parse_cookie_header};
pub use query::parse_query_string;
pub use token::{SessionClaims, TokenError, is_valid_session_token};
pub use transaction::PkceTransaction;
