use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::provider::TokenClient;

/// Shared by every request. Holds nothing per-session: all sign-in state
/// lives in the browser's cookies.
#[derive(Clone, Debug)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub tokens: TokenClient,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let tokens = TokenClient::new(&config)?;

        tracing::debug!(
            token_endpoint = %config.token_endpoint(),
            timeout_secs = config.token_timeout.as_secs(),
            "Token client ready"
        );

        Ok(Self {
            config: Arc::new(config),
            tokens,
        })
    }
}
