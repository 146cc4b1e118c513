use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use bodyworn_device::DeviceClient;
use bodyworn_protocol::{DeviceConfig, NormalizedEvent};
use bodyworn_token::TokenManager;

use crate::GatewayError;
use crate::registry::ClientRegistry;

/// How `/token` obtains the token it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenMode {
    /// Serve the token kept fresh by the background refresh loop.
    #[default]
    Cached,
    /// Fetch a new token from the device on every call.
    PerRequest,
}

/// State shared by every handler and background task.
pub struct GatewayState {
    device_config: DeviceConfig,
    tokens: Arc<TokenManager<DeviceClient>>,
    registry: ClientRegistry,
    target_id: RwLock<String>,
    token_mode: TokenMode,
    cancel: CancellationToken,
}

impl GatewayState {
    pub fn new(
        device_config: DeviceConfig,
        tokens: Arc<TokenManager<DeviceClient>>,
        token_mode: TokenMode,
        cancel: CancellationToken,
    ) -> Self {
        let target_id = RwLock::new(device_config.target_id.clone());
        Self {
            device_config,
            tokens,
            registry: ClientRegistry::new(),
            target_id,
            token_mode,
            cancel,
        }
    }

    pub fn device_config(&self) -> &DeviceConfig {
        &self.device_config
    }

    pub fn tokens(&self) -> &Arc<TokenManager<DeviceClient>> {
        &self.tokens
    }

    pub fn device(&self) -> &DeviceClient {
        self.tokens.source()
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn token_mode(&self) -> TokenMode {
        self.token_mode
    }

    /// Root token; connection tasks run on child tokens of it.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Subject of the last stream-started event, or the configured target.
    pub fn target_id(&self) -> String {
        self.target_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records the event's target and sends it to every `/events` client.
    /// Returns the number of clients it was queued for.
    pub fn publish(&self, event: &NormalizedEvent) -> Result<usize, GatewayError> {
        if !event.subject.is_empty() {
            *self
                .target_id
                .write()
                .unwrap_or_else(PoisonError::into_inner) = event.subject.clone();
        }

        let payload = serde_json::to_string(event)?;
        let delivered = self.registry.broadcast(&payload);
        debug!(clients = delivered, session_id = %event.session_id, "forwarded event to frontends");
        Ok(delivered)
    }
}
