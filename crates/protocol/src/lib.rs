//! Wire types shared by the body-worn camera gateway.
//!
//! Covers three surfaces: the device JSON API (token and event stream
//! envelopes), the normalized event pushed to frontends, and the device
//! configuration loaded at startup.

pub mod config;
pub mod constants;
pub mod device;
pub mod event;

pub use config::DeviceConfig;
pub use event::NormalizedEvent;
