//! Token refresh loop.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bodyworn_device::DeviceError;

use crate::{RefreshPolicy, TokenSource};

/// The last successfully fetched token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSnapshot {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Owns the signaling token.
///
/// One task runs [`TokenManager::run`]; any number of readers call
/// [`TokenManager::snapshot`]. A failed fetch leaves the previous token in
/// place.
pub struct TokenManager<S> {
    source: S,
    policy: RefreshPolicy,
    current: RwLock<Option<TokenSnapshot>>,
}

impl<S: TokenSource> TokenManager<S> {
    pub fn new(source: S, policy: RefreshPolicy) -> Self {
        Self {
            source,
            policy,
            current: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    /// Current token, or `None` until the first fetch succeeds.
    pub fn snapshot(&self) -> Option<TokenSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetches a token without storing it, filling in the default expiry.
    pub async fn fetch_fresh(&self) -> Result<TokenSnapshot, DeviceError> {
        let issued = self.source.fetch().await?;
        let issued_at = Utc::now();
        Ok(TokenSnapshot {
            expires_at: self.policy.expiry(issued_at, issued.expires_at),
            value: issued.value,
            issued_at,
        })
    }

    /// Fetches and stores one token. Returns the delay until the next refresh.
    pub async fn refresh_once(&self) -> Result<Duration, DeviceError> {
        let snapshot = self.fetch_fresh().await?;
        let delay = self.policy.next_delay(snapshot.expires_at, Utc::now());

        info!(
            refreshed = %snapshot.issued_at.to_rfc3339(),
            expires_at = %snapshot.expires_at.to_rfc3339(),
            next_refresh_secs = delay.as_secs(),
            "signaling token refreshed"
        );

        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
        Ok(delay)
    }

    /// Refreshes forever until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut attempt: u32 = 0;
        loop {
            let delay = match self.refresh_once().await {
                Ok(delay) => {
                    attempt = 0;
                    delay
                }
                Err(e) => {
                    attempt = attempt.saturating_add(1);
                    warn!(
                        attempt,
                        delay_secs = self.policy.retry_delay.as_secs(),
                        error = %e,
                        "failed to refresh signaling token"
                    );
                    self.policy.retry_delay
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("token refresh cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
