//! Client for the body-worn camera device API.
//!
//! Wraps the four device endpoints the gateway consumes:
//!
//! - the signaling token CGI (Digest POST),
//! - the WebSocket session CGI (Digest POST),
//! - the event stream WebSocket,
//! - the signaling WebSocket.
//!
//! Certificate validation toward the device is controlled by [`TlsPolicy`].

mod client;
mod endpoints;
mod tls;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use bodyworn_digest_auth::Credentials;
pub use client::{DeviceClient, DeviceSocket, IssuedToken};
pub use endpoints::DeviceEndpoints;
pub use tls::TlsPolicy;

/// Errors produced by device calls.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("digest authentication failed: {0}")]
    Digest(#[from] bodyworn_digest_auth::DigestError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("device returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse token response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("received empty token from device")]
    EmptyToken,

    #[error("received empty session id from device")]
    EmptySession,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),
}
