//! Device event stream subscription.
//!
//! [`EventSubscriber`] keeps one WebSocket open to the device event stream,
//! turns stream-started notifications into [`NormalizedEvent`]s and hands
//! them to an mpsc channel. It reconnects after any failure.
//!
//! [`NormalizedEvent`]: bodyworn_protocol::NormalizedEvent

mod normalize;
mod subscriber;

pub use normalize::normalize;
pub use subscriber::{EventSubscriber, SubscriberConfig, pump_events};

use tokio_tungstenite::tungstenite;

/// Errors produced while reading the event stream.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("device error: {0}")]
    Device(#[from] bodyworn_device::DeviceError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("failed to parse notification: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("failed to parse event body: {0}")]
    Body(serde_json::Error),

    #[error("event data is not an object")]
    InvalidData,

    #[error("event receiver dropped")]
    ReceiverClosed,
}
