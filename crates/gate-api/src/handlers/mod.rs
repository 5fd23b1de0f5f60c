//! The four edge handlers and the glue that picks one per request

pub mod callback;
pub mod gate;
pub mod signin;
pub mod signout;

use serde_json::Value;

use crate::event::{EdgeRequest, EventError, HandlerOutput, request_from_event};
use crate::state::GatewayState;

/// Which handler a viewer request is routed to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handler {
    Gate,
    SignIn,
    Callback,
    SignOut,
}

impl Handler {
    /// The CDN behavior for `path`: the three auth paths get their own
    /// handler, everything else goes through the gate.
    pub fn for_path(path: &str) -> Self {
        match path {
            "/signin" => Self::SignIn,
            "/callback" => Self::Callback,
            "/signout" => Self::SignOut,
            _ => Self::Gate,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Gate => "gate",
            Self::SignIn => "signin",
            Self::Callback => "callback",
            Self::SignOut => "signout",
        }
    }
}

pub async fn dispatch(handler: Handler, state: &GatewayState, request: EdgeRequest) -> HandlerOutput {
    let config = &state.config;
    match handler {
        Handler::Gate => gate::handle(config, request),
        Handler::SignIn => signin::handle(config, &request),
        Handler::Callback => HandlerOutput::Respond(callback::handle(state, &request).await),
        Handler::SignOut => signout::handle(config, &request),
    }
}

/// Run `handler` against a raw CDN event and return the JSON the CDN expects.
///
/// A malformed envelope is an error for every handler except the callback,
/// which answers it with its error page like any other failed sign-in.
pub async fn invoke(handler: Handler, state: &GatewayState, event: &Value) -> Result<Value, EventError> {
    let output = match handler {
        Handler::Callback => HandlerOutput::Respond(callback::handle_event(state, event).await),
        _ => dispatch(handler, state, request_from_event(event)?).await,
    };
    output.to_value()
}
