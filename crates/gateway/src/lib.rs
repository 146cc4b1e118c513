//! HTTP and WebSocket surface of the gateway.
//!
//! - `GET /token`: current signaling token
//! - `GET /api/auth`: loaded device configuration
//! - `GET /events`: WebSocket fan-out of normalized device events
//! - `GET /ws-proxy?token=`: WebSocket tunnel to the device signaling server
//! - `/` and `/static/*`: frontend assets
//!
//! All handlers share one [`GatewayState`].

mod forwarder;
mod proxy;
mod registry;
mod routes;
mod state;

pub use forwarder::forward_events;
pub use proxy::run_tunnel;
pub use registry::{ClientId, ClientRegistry};
pub use routes::{TokenResponse, router, serve};
pub use state::{GatewayState, TokenMode};

/// Errors produced by the gateway server.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("device error: {0}")]
    Device(#[from] bodyworn_device::DeviceError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
