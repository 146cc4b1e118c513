//! Signaling token lifecycle.
//!
//! [`TokenManager`] fetches a token from a [`TokenSource`], keeps the last
//! one that succeeded and schedules the next fetch shortly before it
//! expires. Readers take a [`TokenSnapshot`] at any time.

mod manager;
mod policy;

pub use manager::{TokenManager, TokenSnapshot};
pub use policy::{RefreshPolicy, refresh_delay};

use std::future::Future;
use std::pin::Pin;

use bodyworn_device::{DeviceClient, DeviceError, IssuedToken};

/// Boxed future returned by [`TokenSource::fetch`].
pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<IssuedToken, DeviceError>> + Send + 'a>>;

/// Anything that can issue signaling tokens.
pub trait TokenSource: Send + Sync + 'static {
    fn fetch(&self) -> FetchFuture<'_>;
}

impl TokenSource for DeviceClient {
    fn fetch(&self) -> FetchFuture<'_> {
        Box::pin(self.fetch_token())
    }
}
